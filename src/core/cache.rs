//! Shared, periodically refreshed store of exchange rates.
//!
//! The current rates live behind an `Arc<RateSnapshot>` that refreshes swap
//! wholesale. Readers clone the pointer and never wait on the network.

use crate::core::error::{RateError, Result};
use crate::core::rates::{RateSnapshot, RateSource, RateTable};
use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Callback registered through `subscribe` or `on_refresh_error`.
pub type Listener<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

type Listeners<E> = Mutex<Vec<(SubscriptionId, Listener<E>)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A new table was fetched and is now current
    Updated(Arc<RateSnapshot>),
    /// Another refresh was already running and this call waited for it. The
    /// shared fetch succeeded; its failure is returned as this call's error.
    Coalesced,
    /// The fetch finished after auto refresh was stopped and was thrown away
    Discarded,
}

/// What the last fetch run under the refresh gate did.
#[derive(Debug)]
enum LastFetch {
    Idle,
    Swapped,
    Discarded,
    Failed(RateError),
}

struct AutoRefresh {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    interval: Duration,
}

pub struct RateCache {
    source: Arc<dyn RateSource>,
    current: RwLock<Option<Arc<RateSnapshot>>>,
    refresh_gate: tokio::sync::Mutex<LastFetch>,
    listeners: Listeners<Arc<RateSnapshot>>,
    error_listeners: Listeners<RateError>,
    next_subscription: AtomicU64,
    auto_refresh: Mutex<Option<AutoRefresh>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs every listener against `event`. A listener that errors or panics is
/// logged and skipped.
fn notify<E>(listeners: &Listeners<E>, event: &E) {
    let listeners: Vec<_> = lock(listeners)
        .iter()
        .map(|(id, listener)| (*id, Arc::clone(listener)))
        .collect();

    for (id, listener) in listeners {
        match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(subscription = id.0, error = %e, "Rate listener failed"),
            Err(_) => error!(subscription = id.0, "Rate listener panicked"),
        }
    }
}

impl RateCache {
    /// Creates an empty cache. Nothing is fetched until `refresh` or
    /// `start_auto_refresh` is called.
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self {
            source,
            current: RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(LastFetch::Idle),
            listeners: Mutex::new(Vec::new()),
            error_listeners: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            auto_refresh: Mutex::new(None),
        }
    }

    /// Creates a cache already holding `table`, as if `source` had just
    /// returned it.
    pub fn with_table(source: Arc<dyn RateSource>, table: RateTable) -> Self {
        let snapshot = Arc::new(RateSnapshot::new(table, source.name()));
        let cache = Self::new(source);
        *cache
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        cache
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// The current snapshot, if any fetch has succeeded yet.
    pub fn snapshot(&self) -> Option<Arc<RateSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_populated(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.snapshot().map(|s| s.fetched_at)
    }

    /// Cross rate between two currencies in the current table.
    ///
    /// Fails with `UnknownCurrency` for any code the current table lacks,
    /// including every code while the cache is still empty.
    pub fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let Some(snapshot) = self.snapshot() else {
            debug!(from, to, "Rate lookup on empty cache");
            return Err(RateError::UnknownCurrency(from.to_string()));
        };
        snapshot.table.cross_rate(from, to)
    }

    /// Fetches a fresh table and makes it current.
    ///
    /// On failure the previous table stays in place and the error goes to the
    /// caller and to error listeners. At most one fetch runs at a time; a call
    /// made while one is in flight waits for it and shares its result:
    /// `Coalesced` when it succeeded, its error when it failed. If that fetch
    /// was discarded by `stop`, this call fetches again itself.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let mut gate = match self.refresh_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                debug!("Refresh already in flight, waiting for it");
                let gate = self.refresh_gate.lock().await;
                match &*gate {
                    LastFetch::Swapped => return Ok(RefreshOutcome::Coalesced),
                    LastFetch::Failed(err) => return Err(err.clone()),
                    LastFetch::Idle | LastFetch::Discarded => {}
                }
                debug!("Shared fetch was discarded, fetching again");
                gate
            }
        };
        self.fetch_and_swap(&mut gate, None).await
    }

    /// Refreshes only when nothing has been fetched yet.
    pub async fn ensure_populated(&self) -> Result<Arc<RateSnapshot>> {
        if let Some(snapshot) = self.snapshot() {
            return Ok(snapshot);
        }
        self.refresh().await?;
        self.snapshot().ok_or_else(|| {
            RateError::SourceUnavailable(format!("no rates available from {}", self.source_name()))
        })
    }

    /// Tick of the refresh loop. With `wait_for_gate` unset a tick that finds
    /// a fetch in flight is skipped.
    async fn scheduled_refresh(
        &self,
        shutdown: &watch::Receiver<bool>,
        wait_for_gate: bool,
    ) -> Result<RefreshOutcome> {
        let mut gate = if wait_for_gate {
            self.refresh_gate.lock().await
        } else {
            match self.refresh_gate.try_lock() {
                Ok(gate) => gate,
                Err(_) => {
                    debug!("Skipping scheduled refresh, one is already in flight");
                    return Ok(RefreshOutcome::Coalesced);
                }
            }
        };
        if *shutdown.borrow() {
            return Ok(RefreshOutcome::Discarded);
        }
        self.fetch_and_swap(&mut gate, Some(shutdown)).await
    }

    // `last` is the refresh gate's contents, so the caller holds the gate.
    async fn fetch_and_swap(
        &self,
        last: &mut LastFetch,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<RefreshOutcome> {
        let source = self.source.name();
        debug!(source, "Refreshing exchange rates");

        let fetched = self.source.fetch().await;

        if shutdown.is_some_and(|rx| *rx.borrow()) {
            info!(source, "Auto refresh stopped during fetch, discarding result");
            *last = LastFetch::Discarded;
            return Ok(RefreshOutcome::Discarded);
        }

        match fetched {
            Ok(table) => {
                let snapshot = Arc::new(RateSnapshot::new(table, source));
                *self.current.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::clone(&snapshot));
                info!(
                    source,
                    currencies = snapshot.table.len(),
                    base = snapshot.table.base(),
                    "Exchange rates refreshed"
                );
                *last = LastFetch::Swapped;
                notify(&self.listeners, &snapshot);
                Ok(RefreshOutcome::Updated(snapshot))
            }
            Err(err) => {
                warn!(source, error = %err, "Rate refresh failed, keeping previous rates");
                *last = LastFetch::Failed(err.clone());
                notify(&self.error_listeners, &err);
                Err(err)
            }
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a callback run after every successful refresh.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Arc<RateSnapshot>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id();
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    /// Registers a callback run after every failed refresh.
    pub fn on_refresh_error<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&RateError) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id();
        lock(&self.error_listeners).push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut listeners = lock(&self.listeners);
            let before = listeners.len();
            listeners.retain(|(existing, _)| *existing != id);
            before != listeners.len()
        };
        if removed {
            return true;
        }
        let mut listeners = lock(&self.error_listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }

    /// Spawns the background loop: one refresh right away, then one per
    /// `interval` until `stop` is called or the cache is dropped.
    ///
    /// Returns `false` without starting anything when a loop is already
    /// running or `interval` is zero. Must be called inside a Tokio runtime.
    pub fn start_auto_refresh(self: &Arc<Self>, interval: Duration) -> bool {
        if interval.is_zero() {
            warn!("Refusing to start auto refresh with a zero interval");
            return false;
        }

        let mut slot = lock(&self.auto_refresh);
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            debug!("Auto refresh already running");
            return false;
        }

        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(run_refresh_loop(Arc::downgrade(self), interval, rx));
        *slot = Some(AutoRefresh {
            shutdown,
            handle,
            interval,
        });
        info!(interval_secs = interval.as_secs_f64(), "Auto refresh started");
        true
    }

    /// Cancels the background loop. A fetch already in flight is left to
    /// finish but its result is discarded.
    pub fn stop(&self) {
        if let Some(task) = lock(&self.auto_refresh).take() {
            let _ = task.shutdown.send(true);
            info!("Auto refresh stopped");
        }
    }

    pub fn is_auto_refreshing(&self) -> bool {
        lock(&self.auto_refresh)
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Interval of the running refresh loop, if there is one.
    pub fn refresh_interval(&self) -> Option<Duration> {
        lock(&self.auto_refresh).as_ref().map(|task| task.interval)
    }
}

impl Drop for RateCache {
    fn drop(&mut self) {
        let slot = self
            .auto_refresh
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.take() {
            let _ = task.shutdown.send(true);
        }
    }
}

async fn run_refresh_loop(
    cache: Weak<RateCache>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick must populate the cache, even if a fetch from a stopped
    // loop still holds the gate.
    let mut first_tick = true;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        if *shutdown.borrow() {
            break;
        }
        let Some(cache) = cache.upgrade() else {
            debug!("Rate cache dropped, ending auto refresh");
            break;
        };
        // Failures are already logged and sent to error listeners.
        let _ = cache.scheduled_refresh(&shutdown, first_tick).await;
        first_tick = false;
    }
    debug!("Auto refresh loop exited");
}
