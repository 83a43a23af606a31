use super::util::with_retry;
use crate::core::error::{RateError, Result};
use crate::core::rates::{RateSource, RateTable};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    base: Option<String>,
    rates: HashMap<String, f64>,
}

/// Fetches the latest rate table from an exchangerate-api style endpoint,
/// `GET {base_url}/v4/latest/{base}`.
pub struct OnlineRateSource {
    base_url: String,
    base_currency: String,
    supported: Vec<String>,
    client: reqwest::Client,
}

impl OnlineRateSource {
    pub fn new(
        base_url: &str,
        base_currency: &str,
        supported: Vec<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("xrate/1.0")
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| RateError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;

        Ok(OnlineRateSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            base_currency: base_currency.to_string(),
            supported,
            client,
        })
    }
}

#[async_trait]
impl RateSource for OnlineRateSource {
    #[instrument(
        name = "OnlineRateFetch",
        skip(self),
        fields(base = %self.base_currency)
    )]
    async fn fetch(&self) -> Result<RateTable> {
        let url = format!("{}/v4/latest/{}", self.base_url, self.base_currency);
        debug!("Requesting exchange rates from {}", url);

        let response = with_retry(|| self.client.get(&url).send(), 3, 500)
            .await
            .map_err(|e| RateError::SourceUnavailable(format!("Request error: {e} URL: {url}")))?;

        if !response.status().is_success() {
            return Err(RateError::SourceUnavailable(format!(
                "HTTP error: {} for {}",
                response.status(),
                url
            )));
        }

        let text = response.text().await?;
        let data: LatestRatesResponse = serde_json::from_str(&text).map_err(|e| {
            RateError::SourceUnavailable(format!("Failed to parse JSON response from {url}: {e}"))
        })?;

        if let Some(base) = data.base.as_deref() {
            if base != self.base_currency {
                return Err(RateError::IncompleteData(format!(
                    "expected rates against {}, provider returned {}",
                    self.base_currency, base
                )));
            }
        }

        debug!(received = data.rates.len(), "Received exchange rates");
        RateTable::from_response(&self.base_currency, &data.rates, &self.supported)
    }

    fn name(&self) -> &str {
        "Online Provider"
    }
}
