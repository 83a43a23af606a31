use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;
use xrate::core::config::AppConfig;
use xrate::core::{Converter, RateCache, RateError, RateTable, RefreshOutcome};
use xrate::providers::{ProviderSettings, RateRegistry};

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const LATEST_USD: &str = r#"{
        "base": "USD",
        "date": "2026-10-19",
        "rates": {"USD": 1, "BRL": 5.0, "EUR": 0.9, "GBP": 0.8, "CNY": 7.1, "JPY": 150.0}
    }"#;

    pub const LATEST_USD_UPDATED: &str = r#"{
        "base": "USD",
        "rates": {"USD": 1, "BRL": 5.5, "EUR": 0.95, "GBP": 0.85, "CNY": 7.2}
    }"#;

    pub async fn create_mock_server(base: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let url_path = format!("/v4/latest/{base}");

        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    /// Serves each body once, in order, then answers 500.
    pub async fn create_sequenced_mock_server(base: &str, bodies: &[&str]) -> MockServer {
        let mock_server = MockServer::start().await;
        let url_path = format!("/v4/latest/{base}");

        for body in bodies {
            Mock::given(method("GET"))
                .and(path(url_path.clone()))
                .respond_with(ResponseTemplate::new(200).set_body_string(*body))
                .up_to_n_times(1)
                .mount(&mock_server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        mock_server
    }

    pub fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, content).expect("Failed to write config file");
        config_path
    }
}

fn online_config(base_url: &str) -> String {
    format!(
        r#"
        currencies: ["USD", "BRL", "EUR", "GBP", "CNY"]
        base_currency: "USD"
        provider: "online"
        providers:
          online:
            base_url: {base_url}
    "#
    )
}

fn online_cache(base_url: &str) -> Arc<RateCache> {
    let config: AppConfig =
        serde_yaml::from_str(&online_config(base_url)).expect("Failed to parse config");
    xrate::build_cache(&config, &RateRegistry::with_defaults()).expect("Failed to build cache")
}

#[test_log::test(tokio::test)]
async fn test_full_convert_flow_with_mock() {
    let mock_server = test_utils::create_mock_server("USD", test_utils::LATEST_USD).await;
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(&dir, &online_config(&mock_server.uri()));

    let result = xrate::run_command(
        xrate::AppCommand::Convert {
            amount: 100.0,
            from: "USD".to_string(),
            to: "EUR".to_string(),
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Convert failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_full_rates_flow_with_mock() {
    let mock_server = test_utils::create_mock_server("USD", test_utils::LATEST_USD).await;
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(&dir, &online_config(&mock_server.uri()));

    let result = xrate::run_command(
        xrate::AppCommand::Rates {
            base: Some("EUR".to_string()),
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Rates failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_convert_with_fixed_provider() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(
        &dir,
        r#"
        currencies: ["USD", "EUR", "BRL"]
        provider: "fixed"
        providers:
          fixed:
            rates:
              USD: 1.0
              EUR: 0.9
              BRL: 5.0
    "#,
    );

    let result = xrate::run_command(
        xrate::AppCommand::Convert {
            amount: 100.0,
            from: "EUR".to_string(),
            to: "BRL".to_string(),
        },
        Some(config_path.to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Convert failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_convert_reports_canonical_errors() {
    let mock_server = test_utils::create_mock_server("USD", test_utils::LATEST_USD).await;
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(&dir, &online_config(&mock_server.uri()));
    let config_path = config_path.to_str().unwrap();

    let err = xrate::run_command(
        xrate::AppCommand::Convert {
            amount: -5.0,
            from: "USD".to_string(),
            to: "EUR".to_string(),
        },
        Some(config_path),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<RateError>(),
        Some(&RateError::InvalidAmount(-5.0))
    );

    // JPY is in the provider response but not in the configured currencies.
    let err = xrate::run_command(
        xrate::AppCommand::Convert {
            amount: 100.0,
            from: "USD".to_string(),
            to: "JPY".to_string(),
        },
        Some(config_path),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<RateError>(),
        Some(&RateError::UnknownCurrency("JPY".to_string()))
    );
}

#[test_log::test(tokio::test)]
async fn test_unknown_provider_in_config() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = test_utils::write_config(&dir, r#"provider: "carrier-pigeon""#);

    let err = xrate::run_command(
        xrate::AppCommand::Rates { base: None },
        Some(config_path.to_str().unwrap()),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<RateError>(),
        Some(&RateError::UnknownProvider("carrier-pigeon".to_string()))
    );
    assert!(err.to_string().contains("Failed to create rate provider"));
}

#[test_log::test(tokio::test)]
async fn test_provider_outage_surfaces_on_first_fetch() {
    let mock_server = test_utils::create_sequenced_mock_server("USD", &[]).await;
    let cache = online_cache(&mock_server.uri());

    let err = cache.refresh().await.unwrap_err();
    info!(%err, "Refresh failed as expected");
    assert!(matches!(err, RateError::SourceUnavailable(_)));
    assert!(matches!(
        cache.get_rate("USD", "EUR"),
        Err(RateError::UnknownCurrency(_))
    ));
}

#[test_log::test(tokio::test)]
async fn test_online_cache_refreshes_and_serves_stale_rates() {
    let mock_server = test_utils::create_sequenced_mock_server(
        "USD",
        &[test_utils::LATEST_USD, test_utils::LATEST_USD_UPDATED],
    )
    .await;
    let cache = online_cache(&mock_server.uri());
    let converter = Converter::new(Arc::clone(&cache));

    let updates = Arc::new(AtomicUsize::new(0));
    cache.subscribe({
        let updates = Arc::clone(&updates);
        move |snapshot| {
            info!(base = snapshot.table.base(), "Rates updated");
            updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });

    assert!(matches!(
        cache.refresh().await.unwrap(),
        RefreshOutcome::Updated(_)
    ));
    let eur = converter.convert(100.0, "USD", "EUR").unwrap();
    assert!((eur - 90.0).abs() < 1e-9);
    let usd = converter.convert(100.0, "EUR", "USD").unwrap();
    assert!((usd - 111.11).abs() < 0.01);

    cache.refresh().await.unwrap();
    let eur = converter.convert(100.0, "USD", "EUR").unwrap();
    assert!((eur - 95.0).abs() < 1e-9);

    // Provider now answers 500; the last good table stays in use.
    assert!(matches!(
        cache.refresh().await,
        Err(RateError::SourceUnavailable(_))
    ));
    let eur = converter.convert(100.0, "USD", "EUR").unwrap();
    assert!((eur - 95.0).abs() < 1e-9);
    assert_eq!(updates.load(Ordering::SeqCst), 2);
}

#[test_log::test(tokio::test)]
async fn test_auto_refresh_with_online_provider() {
    let mock_server = test_utils::create_mock_server("USD", test_utils::LATEST_USD).await;
    let cache = online_cache(&mock_server.uri());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    cache.subscribe(move |snapshot| {
        tx.send(snapshot.table.len())?;
        Ok(())
    });

    assert!(cache.start_auto_refresh(Duration::from_secs(3600)));
    assert!(!cache.start_auto_refresh(Duration::from_secs(3600)));

    let currencies = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("initial refresh should complete")
        .expect("listener channel closed");
    assert_eq!(currencies, 5);
    assert_eq!(cache.get_rate("GBP", "GBP").unwrap(), 1.0);

    cache.stop();
    assert!(!cache.is_auto_refreshing());
}

#[test_log::test(tokio::test)]
async fn test_registry_accepts_new_providers() {
    let mut registry = RateRegistry::with_defaults();
    registry.register("parity", |settings| {
        Ok(Arc::new(xrate::providers::FixedRateSource::new(
            &settings.base_currency,
            settings
                .supported_currencies
                .iter()
                .map(|code| (code.clone(), 1.0)),
            settings.supported_currencies.clone(),
        )))
    });

    let settings = ProviderSettings {
        supported_currencies: vec!["USD".to_string(), "USDC".to_string()],
        ..ProviderSettings::default()
    };
    let source = registry.create("parity", &settings).unwrap();
    let cache = Arc::new(RateCache::new(source));
    cache.ensure_populated().await.unwrap();

    let converter = Converter::new(cache);
    assert_eq!(converter.convert(25.0, "USDC", "USD").unwrap(), 25.0);
}

#[test_log::test(tokio::test)]
async fn test_supported_code_missing_from_table_is_unknown() {
    let supported = vec!["USD".to_string(), "EUR".to_string(), "ZZZ".to_string()];
    let source = Arc::new(xrate::providers::FixedRateSource::new(
        "USD",
        [("EUR".to_string(), 0.9)],
        supported,
    ));
    let table = RateTable::new("USD", [("EUR".to_string(), 0.9)]).unwrap();
    let cache = Arc::new(RateCache::with_table(source, table));

    assert_eq!(
        cache.get_rate("USD", "ZZZ").unwrap_err(),
        RateError::UnknownCurrency("ZZZ".to_string())
    );
    assert_eq!(
        cache.get_rate("ZZZ", "EUR").unwrap_err(),
        RateError::UnknownCurrency("ZZZ".to_string())
    );

    // The source cannot supply ZZZ either, so a refresh keeps the old table.
    assert!(matches!(
        cache.refresh().await,
        Err(RateError::IncompleteData(_))
    ));
    let converter = Converter::new(Arc::clone(&cache));
    assert_eq!(
        converter.convert(10.0, "USD", "ZZZ").unwrap_err(),
        RateError::UnknownCurrency("ZZZ".to_string())
    );
    assert!((converter.convert(10.0, "USD", "EUR").unwrap() - 9.0).abs() < 1e-9);
}

#[test]
fn test_setup_writes_loadable_config() {
    let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
    let config_path = dir.path().join("config.yaml");

    xrate::cli::setup::setup_at_path(&config_path).expect("Setup failed");
    let config = AppConfig::load_from_path(&config_path).expect("Config should load");
    assert_eq!(config.provider, "online");

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("refresh_interval_secs"));
}
