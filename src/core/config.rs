use crate::core::cache::DEFAULT_REFRESH_INTERVAL;
use crate::providers::registry::ProviderSettings;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_ONLINE_BASE_URL: &str = "https://api.exchangerate-api.com";

fn default_currencies() -> Vec<String> {
    ["USD", "BRL", "EUR", "GBP", "CNY"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn default_provider() -> String {
    "online".to_string()
}

fn default_online_base_url() -> String {
    DEFAULT_ONLINE_BASE_URL.to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OnlineProviderConfig {
    #[serde(default = "default_online_base_url")]
    pub base_url: String,
    pub timeout_secs: Option<u64>,
}

impl Default for OnlineProviderConfig {
    fn default() -> Self {
        OnlineProviderConfig {
            base_url: default_online_base_url(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FixedProviderConfig {
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub online: OnlineProviderConfig,
    pub fixed: Option<FixedProviderConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_currencies")]
    pub currencies: Vec<String>,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            currencies: default_currencies(),
            base_currency: default_base_currency(),
            refresh_interval_secs: default_refresh_interval_secs(),
            provider: default_provider(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, falling back to built-in
    /// defaults when no file exists there.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "xrate", "xrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Parameters handed to the registry when building the configured source.
    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            base_currency: self.base_currency.clone(),
            supported_currencies: self.currencies.clone(),
            base_url: Some(self.providers.online.base_url.clone()),
            timeout: self.providers.online.timeout_secs.map(Duration::from_secs),
            fixed_rates: self.providers.fixed.as_ref().map(|f| f.rates.clone()),
        }
    }
}
