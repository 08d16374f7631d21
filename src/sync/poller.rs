use crate::core::currency::ExchangeCurrency;
use crate::core::error::RateError;
use crate::core::price::{CurrentRate, PriceSource};
use crate::core::store::RateCache;
use crate::sync::snapshot::TrackerSnapshot;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Periodically fetches the current rate and publishes observed changes.
///
/// Every fetch draws a monotonically increasing token. A completion whose
/// token is not newer than the last applied one is discarded, so a slow
/// response can never overwrite a fresher rate. An identical rate is not
/// republished and not rewritten to the cache.
pub struct RatePoller {
    source: Arc<dyn PriceSource>,
    cache: Arc<dyn RateCache>,
    state: Arc<watch::Sender<TrackerSnapshot>>,
    interval: Duration,
    fetch_seq: AtomicU64,
    applied_seq: AtomicU64,
}

/// A running poll loop. `stop` cancels the loop and drops any in-flight
/// fetch without publishing it.
pub struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

impl RatePoller {
    pub fn new(
        source: Arc<dyn PriceSource>,
        cache: Arc<dyn RateCache>,
        state: Arc<watch::Sender<TrackerSnapshot>>,
        interval: Duration,
    ) -> Self {
        RatePoller {
            source,
            cache,
            state,
            interval,
            fetch_seq: AtomicU64::new(0),
            applied_seq: AtomicU64::new(0),
        }
    }

    /// Publish the cached rate, but only while nothing has been published yet.
    pub async fn seed_from_cache(&self) {
        let Some(cached) = self.cache.get().await else {
            return;
        };
        self.state.send_if_modified(|snapshot| {
            if snapshot.current_rate.is_some() {
                return false;
            }
            debug!("Seeding rate from cache: {} {}", cached.rate, cached.currency);
            snapshot.current_rate = Some(cached);
            true
        });
    }

    /// One fetch-and-apply cycle for the currently tracked currency.
    pub async fn poll_once(&self) {
        let currency = self.state.borrow().currency;
        let token = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.source.fetch_current_rate(currency).await;
        self.apply_completion(token, currency, result).await;
    }

    /// Start the repeating poll loop; the first fetch runs immediately,
    /// preceded by the optimistic cache seed.
    pub fn start(self: Arc<Self>) -> PollerHandle {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let poller = self;

        let task = tokio::spawn(async move {
            poller.seed_from_cache().await;
            let mut ticker = tokio::time::interval(poller.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = poller.poll_once() => {}
                }
            }
        });

        PollerHandle { cancel, task }
    }

    async fn apply_completion(
        &self,
        token: u64,
        currency: ExchangeCurrency,
        result: Result<f64, RateError>,
    ) {
        let mut cache_write = None;
        self.state.send_if_modified(|snapshot| {
            // The watch lock serializes completions; every ordering decision
            // happens inside this closure.
            if token <= self.applied_seq.load(Ordering::SeqCst) {
                debug!("Discarding stale completion (token {})", token);
                return false;
            }
            if snapshot.currency != currency {
                // The tracked currency moved on while this fetch was in
                // flight. Leave the token unclaimed so a completion for the
                // new currency drawn earlier still applies.
                debug!("Discarding completion for inactive currency {}", currency);
                return false;
            }
            self.applied_seq.store(token, Ordering::SeqCst);

            match result {
                Ok(rate) => {
                    let fresh = CurrentRate { rate, currency };
                    let had_error = snapshot.error.take().is_some();
                    if snapshot.current_rate == Some(fresh) {
                        // Same value as last time; publish only if an error
                        // was just cleared, and skip the cache either way.
                        return had_error;
                    }
                    debug!("Rate changed: {} {}", fresh.rate, fresh.currency);
                    snapshot.current_rate = Some(fresh);
                    cache_write = Some(fresh);
                    true
                }
                Err(err) => {
                    warn!("Rate fetch failed: {}", err);
                    if snapshot.error.as_ref() == Some(&err) {
                        return false;
                    }
                    snapshot.error = Some(err);
                    true
                }
            }
        });

        if let Some(fresh) = cache_write {
            self.cache.set(fresh).await;
        }
    }
}
