use super::ui;
use crate::core::{Conversion, ConversionRequest, Converter};
use anyhow::Result;
use tracing::info;

/// Renders a conversion as the two lines printed by `xrate convert`.
pub fn format_conversion(conversion: &Conversion, provider: &str) -> String {
    let request = &conversion.request;
    let headline = format!(
        "{:.2} {} = {}",
        request.amount,
        request.from,
        ui::style_text(
            &format!("{:.2} {}", conversion.converted, request.to),
            ui::StyleType::TotalValue
        )
    );
    let detail = format!(
        "1 {} = {:.6} {} | {} | rates as of {}",
        request.from,
        conversion.rate,
        request.to,
        provider,
        conversion.rates_as_of.format("%Y-%m-%d %H:%M:%S UTC")
    );
    format!("{headline}\n{}", ui::style_text(&detail, ui::StyleType::Subtle))
}

pub async fn run(converter: &Converter, request: &ConversionRequest) -> Result<()> {
    // Validate before hitting the network.
    request.validate()?;

    let spinner = ui::new_spinner("Fetching exchange rates...");
    let populated = converter.cache().ensure_populated().await;
    spinner.finish_and_clear();
    populated?;

    let conversion = converter.convert_request(request)?;
    info!(
        amount = request.amount,
        from = %request.from,
        to = %request.to,
        converted = conversion.converted,
        "Converted amount"
    );
    println!("{}", format_conversion(&conversion, converter.provider_name()));
    Ok(())
}
