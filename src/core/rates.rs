//! Rate tables and the source abstraction that produces them

use crate::core::error::{RateError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Currency code to rate, every rate expressed against one base currency.
///
/// A table only exists in a valid state: every rate is strictly positive and
/// finite, and the base currency is always present at `1.0` unless the
/// provider supplied its own figure for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    base: String,
    rates: BTreeMap<String, f64>,
}

impl RateTable {
    pub fn new<I>(base: &str, rates: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let mut table = BTreeMap::new();
        for (code, rate) in rates {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(RateError::IncompleteData(format!(
                    "rate for {code} must be positive and finite, got {rate}"
                )));
            }
            table.insert(code, rate);
        }
        table.entry(base.to_string()).or_insert(1.0);

        Ok(Self {
            base: base.to_string(),
            rates: table,
        })
    }

    /// Builds a table holding exactly the `supported` codes taken from a raw
    /// provider response. An empty `supported` list keeps every rate.
    pub fn from_response(
        base: &str,
        raw: &HashMap<String, f64>,
        supported: &[String],
    ) -> Result<Self> {
        if supported.is_empty() {
            return Self::new(base, raw.iter().map(|(c, r)| (c.clone(), *r)));
        }

        let mut selected = Vec::with_capacity(supported.len());
        for code in supported {
            match raw.get(code) {
                Some(rate) => selected.push((code.clone(), *rate)),
                None if code == base => selected.push((code.clone(), 1.0)),
                None => {
                    return Err(RateError::IncompleteData(format!(
                        "no rate for {code} in provider response"
                    )));
                }
            }
        }
        Self::new(base, selected)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rates.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Codes in the table, alphabetically.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(code, rate)| (code.as_str(), *rate))
    }

    /// How many units of `to` one unit of `from` buys.
    ///
    /// Both rates share the table's base, so the cross rate is a plain ratio.
    pub fn cross_rate(&self, from: &str, to: &str) -> Result<f64> {
        let from_rate = self
            .get(from)
            .ok_or_else(|| RateError::UnknownCurrency(from.to_string()))?;
        let to_rate = self
            .get(to)
            .ok_or_else(|| RateError::UnknownCurrency(to.to_string()))?;
        Ok(to_rate / from_rate)
    }
}

/// An immutable, timestamped rate table as held by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub table: RateTable,
    pub fetched_at: DateTime<Utc>,
    pub source: String,
}

impl RateSnapshot {
    pub fn new(table: RateTable, source: &str) -> Self {
        Self {
            table,
            fetched_at: Utc::now(),
            source: source.to_string(),
        }
    }
}

/// Anything able to produce a complete rate table on demand.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(&self) -> Result<RateTable>;

    /// Human readable provider name
    fn name(&self) -> &str;
}
