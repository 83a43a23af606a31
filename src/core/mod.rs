//! Core business logic abstractions

pub mod cache;
pub mod config;
pub mod converter;
pub mod error;
pub mod log;
pub mod rates;

// Re-export main types for cleaner imports
pub use cache::{RateCache, RefreshOutcome, SubscriptionId};
pub use converter::{Conversion, ConversionRequest, Converter};
pub use error::RateError;
pub use rates::{RateSnapshot, RateSource, RateTable};
