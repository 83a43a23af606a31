//! Error kinds shared by rate sources, the cache and the converter.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RateError>;

/// Every failure the rate core can report.
///
/// Lookup and conversion errors reach callers as-is. Source errors are only
/// ever seen by whoever asked for a refresh, or by error listeners.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateError {
    #[error("Rate source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Incomplete rate data: {0}")]
    IncompleteData(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Unknown rate provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid amount: {0}. Amount must be a finite number greater than zero")]
    InvalidAmount(f64),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for RateError {
    fn from(err: reqwest::Error) -> Self {
        RateError::SourceUnavailable(err.to_string())
    }
}
