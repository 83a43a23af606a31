use crate::core::RateError;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Right aligned cell for a rate, bold when it is the base.
pub fn rate_cell(rate: f64, is_base: bool) -> Cell {
    let cell = Cell::new(format!("{rate:.4}")).set_alignment(CellAlignment::Right);
    if is_base {
        cell.add_attribute(Attribute::Bold)
    } else {
        cell
    }
}

/// Creates a spinner shown while rates are being fetched.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Message shown to the user for a failed command.
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<RateError>() {
        Some(RateError::InvalidAmount(_)) => "Amount must be greater than zero".to_string(),
        Some(RateError::UnknownCurrency(code)) => format!("Invalid currency: {code}"),
        Some(RateError::UnknownProvider(id)) => format!("Unknown rate provider: {id}"),
        Some(RateError::SourceUnavailable(_)) | Some(RateError::IncompleteData(_)) => {
            format!("Exchange rates are unavailable right now ({err})")
        }
        Some(RateError::InvalidConfig(msg)) => format!("Configuration problem: {msg}"),
        None => format!("{err:#}"),
    }
}
