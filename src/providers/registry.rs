//! Lookup from provider id to a factory building its `RateSource`.

use super::fixed::FixedRateSource;
use super::online::OnlineRateSource;
use crate::core::config::DEFAULT_ONLINE_BASE_URL;
use crate::core::error::{RateError, Result};
use crate::core::rates::RateSource;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Parameters a factory may draw on. Each provider reads only what it needs.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub base_currency: String,
    pub supported_currencies: Vec<String>,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub fixed_rates: Option<BTreeMap<String, f64>>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        ProviderSettings {
            base_currency: "USD".to_string(),
            supported_currencies: Vec::new(),
            base_url: None,
            timeout: None,
            fixed_rates: None,
        }
    }
}

pub type ProviderFactory =
    Box<dyn Fn(&ProviderSettings) -> Result<Arc<dyn RateSource>> + Send + Sync>;

pub struct RateRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl RateRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the `online` and `fixed` providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("online", |settings| {
            let base_url = settings
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_ONLINE_BASE_URL);
            let source = OnlineRateSource::new(
                base_url,
                &settings.base_currency,
                settings.supported_currencies.clone(),
                settings.timeout,
            )?;
            Ok(Arc::new(source))
        });
        registry.register("fixed", |settings| {
            let rates = settings.fixed_rates.as_ref().ok_or_else(|| {
                RateError::InvalidConfig("fixed provider requires a rates map".to_string())
            })?;
            Ok(Arc::new(FixedRateSource::new(
                &settings.base_currency,
                rates.iter().map(|(code, rate)| (code.clone(), *rate)),
                settings.supported_currencies.clone(),
            )))
        });
        registry
    }

    /// Adds or replaces the factory for `id`.
    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(&ProviderSettings) -> Result<Arc<dyn RateSource>> + Send + Sync + 'static,
    {
        debug!(provider = id, "Registering rate provider");
        self.factories.insert(id.to_string(), Box::new(factory));
    }

    pub fn create(&self, id: &str, settings: &ProviderSettings) -> Result<Arc<dyn RateSource>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| RateError::UnknownProvider(id.to_string()))?;
        factory(settings)
    }

    /// Registered provider ids, sorted.
    pub fn providers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for RateRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
