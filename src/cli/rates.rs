use super::ui;
use crate::core::{RateCache, RateError, RateSnapshot};
use anyhow::Result;

/// Renders every cached currency against `base` (the table's own base when
/// `None`).
pub fn display_as_table(snapshot: &RateSnapshot, base: Option<&str>) -> Result<String, RateError> {
    let table = &snapshot.table;
    let base = base.unwrap_or(table.base());
    if !table.contains(base) {
        return Err(RateError::UnknownCurrency(base.to_string()));
    }

    let mut output_table = ui::new_styled_table();
    output_table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Per 1 {base}")),
        ui::header_cell(&format!("In {base}")),
    ]);

    for code in table.codes() {
        let rate = table.cross_rate(base, code)?;
        let inverse = table.cross_rate(code, base)?;
        let is_base = code == base;
        output_table.add_row(vec![
            comfy_table::Cell::new(code),
            ui::rate_cell(rate, is_base),
            ui::rate_cell(inverse, is_base),
        ]);
    }

    let mut output = format!(
        "Exchange rates: {}\n\n",
        ui::style_text(&snapshot.source, ui::StyleType::Title)
    );
    output.push_str(&output_table.to_string());
    output.push_str(&format!(
        "\n\n{} {}",
        ui::style_text("Updated:", ui::StyleType::TotalLabel),
        ui::style_text(
            &snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ui::StyleType::Subtle
        )
    ));
    Ok(output)
}

pub async fn run(cache: &RateCache, base: Option<&str>) -> Result<()> {
    let spinner = ui::new_spinner("Fetching exchange rates...");
    let populated = cache.ensure_populated().await;
    spinner.finish_and_clear();

    let snapshot = populated?;
    println!("{}", display_as_table(&snapshot, base)?);
    Ok(())
}
