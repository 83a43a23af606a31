//! Amount conversion on top of the rate cache

use crate::core::cache::RateCache;
use crate::core::error::{RateError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

impl ConversionRequest {
    pub fn new(amount: f64, from: &str, to: &str) -> Self {
        Self {
            amount,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Rejects amounts that are not finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        check_amount(self.amount)
    }
}

fn check_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(RateError::InvalidAmount(amount));
    }
    Ok(())
}

/// Outcome of a conversion along with the rate that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub request: ConversionRequest,
    pub rate: f64,
    pub converted: f64,
    pub rates_as_of: DateTime<Utc>,
}

pub struct Converter {
    cache: Arc<RateCache>,
}

impl Converter {
    pub fn new(cache: Arc<RateCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    pub fn provider_name(&self) -> &str {
        self.cache.source_name()
    }

    /// Converts `amount` of `from` into `to` using the cached rates.
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64> {
        check_amount(amount)?;
        let rate = self.cache.get_rate(from, to)?;
        Ok(amount * rate)
    }

    pub fn convert_request(&self, request: &ConversionRequest) -> Result<Conversion> {
        request.validate()?;

        // Rate and timestamp must come from the same table.
        let snapshot = self
            .cache
            .snapshot()
            .ok_or_else(|| RateError::UnknownCurrency(request.from.clone()))?;
        let rate = snapshot.table.cross_rate(&request.from, &request.to)?;

        Ok(Conversion {
            request: request.clone(),
            rate,
            converted: request.amount * rate,
            rates_as_of: snapshot.fetched_at,
        })
    }
}
