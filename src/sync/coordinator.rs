use crate::core::currency::ExchangeCurrency;
use crate::core::error::RateError;
use crate::core::price::PriceSource;
use crate::core::store::{BarStore, RateCache};
use crate::sync::poller::{PollerHandle, RatePoller};
use crate::sync::reconciler::{BarReconciler, RefreshOutcome};
use crate::sync::snapshot::TrackerSnapshot;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

/// Owns the tracker state and coordinates the poller and the reconciler.
///
/// All state flows through one watch channel. Switching currency publishes
/// the stored bars for the new currency immediately, then fetches a fresh
/// rate and reconciles history; results arriving for a currency that is no
/// longer tracked stay in the store but never reach the snapshot.
pub struct RateTracker {
    state: Arc<watch::Sender<TrackerSnapshot>>,
    poller: Arc<RatePoller>,
    reconciler: Arc<BarReconciler>,
    store: Arc<dyn BarStore>,
    handle: Mutex<Option<PollerHandle>>,
}

impl RateTracker {
    pub fn new(
        source: Arc<dyn PriceSource>,
        cache: Arc<dyn RateCache>,
        store: Arc<dyn BarStore>,
        currency: ExchangeCurrency,
        poll_interval: Duration,
    ) -> Self {
        let (tx, _) = watch::channel(TrackerSnapshot::new(currency));
        let state = Arc::new(tx);
        let poller = Arc::new(RatePoller::new(
            Arc::clone(&source),
            cache,
            Arc::clone(&state),
            poll_interval,
        ));
        let reconciler = Arc::new(BarReconciler::new(source, Arc::clone(&store)));

        RateTracker {
            state,
            poller,
            reconciler,
            store,
            handle: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        self.state.borrow().clone()
    }

    pub fn currency(&self) -> ExchangeCurrency {
        self.state.borrow().currency
    }

    /// Publish the cached rate if nothing has been published yet.
    pub async fn seed_from_cache(&self) {
        self.poller.seed_from_cache().await;
    }

    /// Fetch the current rate once for the tracked currency.
    pub async fn poll_once(&self) {
        self.poller.poll_once().await;
    }

    /// Switch the tracked currency.
    ///
    /// Stored bars for the new currency are published right away, then a
    /// rate fetch and a history refresh run concurrently. Setting the
    /// currency already tracked does nothing.
    pub async fn set_currency(&self, currency: ExchangeCurrency) {
        if self.state.borrow().currency == currency {
            return;
        }
        info!("Switching tracked currency to {}", currency);

        let stored = match self.store.bars(currency).await {
            Ok(bars) => bars,
            Err(err) => {
                warn!("Stored bars unavailable for {}: {}", currency, err);
                Vec::new()
            }
        };
        self.state.send_if_modified(|snapshot| {
            snapshot.currency = currency;
            snapshot.bars = stored;
            snapshot.history_loading = false;
            true
        });

        let _ = tokio::join!(self.poller.poll_once(), self.refresh_history(currency));
    }

    /// Reconcile stored history for `currency` and publish the result when
    /// that currency is still the tracked one.
    pub async fn refresh_history(
        &self,
        currency: ExchangeCurrency,
    ) -> Result<RefreshOutcome, RateError> {
        let started = self.state.send_if_modified(|snapshot| {
            if snapshot.currency != currency || snapshot.history_loading {
                return false;
            }
            snapshot.history_loading = true;
            true
        });

        let outcome = self.reconciler.refresh(currency).await;

        // A skipped refresh belongs to the run already in flight, which
        // will publish its own completion.
        if matches!(outcome, Ok(RefreshOutcome::Skipped)) {
            if started {
                self.state.send_if_modified(|snapshot| {
                    if snapshot.currency != currency {
                        return false;
                    }
                    snapshot.history_loading = false;
                    true
                });
            }
            return outcome;
        }

        // Re-published after success and failure alike: a failed refresh
        // still surfaces whatever window the store already holds.
        let stored = match self.store.bars(currency).await {
            Ok(bars) => Some(bars),
            Err(err) => {
                warn!("Stored bars unavailable for {}: {}", currency, err);
                None
            }
        };

        let completed_at = Utc::now();
        self.state.send_if_modified(|snapshot| {
            if snapshot.currency != currency {
                // The user left this currency mid-refresh; its bars stay in
                // the store but are not surfaced.
                return false;
            }
            let mut changed = false;
            if started {
                snapshot.history_loading = false;
                changed = true;
            }
            if let Some(bars) = stored {
                snapshot.bars = bars;
                changed = true;
            }
            match &outcome {
                Ok(_) => {
                    snapshot.last_synced = Some(completed_at);
                    changed = true;
                }
                Err(err) => {
                    snapshot.error = Some(err.clone());
                    changed = true;
                }
            }
            changed
        });

        outcome
    }

    /// Start the live poll loop, replacing any previous one.
    pub async fn start_live_polling(&self) {
        let mut slot = self.handle.lock().await;
        if let Some(existing) = slot.take() {
            existing.stop().await;
        }
        *slot = Some(Arc::clone(&self.poller).start());
        drop(slot);

        self.state.send_if_modified(|snapshot| {
            if snapshot.polling {
                return false;
            }
            snapshot.polling = true;
            true
        });
    }

    /// Stop the live poll loop; an in-flight fetch is dropped unpublished.
    pub async fn stop_live_polling(&self) {
        let taken = self.handle.lock().await.take();
        if let Some(handle) = taken {
            handle.stop().await;
        }

        self.state.send_if_modified(|snapshot| {
            if !snapshot.polling {
                return false;
            }
            snapshot.polling = false;
            true
        });
    }
}
