use super::ui;
use crate::core::{RateCache, RateError, RateSnapshot};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub fn format_update(snapshot: &RateSnapshot) -> String {
    let rates = snapshot
        .table
        .iter()
        .filter(|(code, _)| *code != snapshot.table.base())
        .map(|(code, rate)| format!("{code} {rate:.4}"))
        .collect::<Vec<_>>()
        .join("  ");
    format!(
        "[{}] 1 {} = {}",
        snapshot.fetched_at.format("%H:%M:%S"),
        snapshot.table.base(),
        rates
    )
}

pub fn format_failure(err: &RateError) -> String {
    ui::style_text(
        &format!("Refresh failed, keeping previous rates: {err}"),
        ui::StyleType::Error,
    )
}

/// Keeps the cache refreshing every `interval`, printing each outcome, until
/// `shutdown` resolves.
pub async fn run<F>(cache: Arc<RateCache>, interval: Duration, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let updates = cache.subscribe(|snapshot| {
        println!("{}", format_update(snapshot));
        Ok(())
    });
    let failures = cache.on_refresh_error(|err| {
        eprintln!("{}", format_failure(err));
        Ok(())
    });

    if !cache.start_auto_refresh(interval) {
        cache.unsubscribe(updates);
        cache.unsubscribe(failures);
        anyhow::bail!("Auto refresh could not be started with an interval of {interval:?}");
    }
    info!(
        provider = cache.source_name(),
        interval_secs = interval.as_secs(),
        "Watching exchange rates"
    );

    shutdown.await;

    cache.stop();
    cache.unsubscribe(updates);
    cache.unsubscribe(failures);
    info!("Stopped watching exchange rates");
    Ok(())
}
