pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{ConversionRequest, Converter, RateCache};
use crate::providers::RateRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Convert { amount: f64, from: String, to: String },
    Rates { base: Option<String> },
    Watch { interval_secs: Option<u64> },
}

/// Builds the configured rate source and an empty cache around it.
pub fn build_cache(config: &AppConfig, registry: &RateRegistry) -> Result<Arc<RateCache>> {
    let source = registry
        .create(&config.provider, &config.provider_settings())
        .with_context(|| format!("Failed to create rate provider '{}'", config.provider))?;
    debug!(provider = %config.provider, name = source.name(), "Rate source ready");
    Ok(Arc::new(RateCache::new(source)))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("xrate starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let registry = RateRegistry::with_defaults();
    let cache = build_cache(&config, &registry)?;

    match command {
        AppCommand::Convert { amount, from, to } => {
            let converter = Converter::new(Arc::clone(&cache));
            let request = ConversionRequest::new(amount, &from, &to);
            cli::convert::run(&converter, &request).await
        }
        AppCommand::Rates { base } => cli::rates::run(&cache, base.as_deref()).await,
        AppCommand::Watch { interval_secs } => {
            let interval = interval_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.refresh_interval());
            cli::watch::run(cache, interval, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                }
            })
            .await
        }
    }
}
