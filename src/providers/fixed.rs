use crate::core::error::Result;
use crate::core::rates::{RateSource, RateTable};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Serves the same configured rates on every fetch. Useful offline and in
/// tests.
pub struct FixedRateSource {
    base_currency: String,
    rates: HashMap<String, f64>,
    supported: Vec<String>,
}

impl FixedRateSource {
    pub fn new<I>(base_currency: &str, rates: I, supported: Vec<String>) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        FixedRateSource {
            base_currency: base_currency.to_string(),
            rates: rates.into_iter().collect(),
            supported,
        }
    }
}

#[async_trait]
impl RateSource for FixedRateSource {
    async fn fetch(&self) -> Result<RateTable> {
        debug!(currencies = self.rates.len(), "Serving fixed exchange rates");
        RateTable::from_response(&self.base_currency, &self.rates, &self.supported)
    }

    fn name(&self) -> &str {
        "Fixed Provider"
    }
}
