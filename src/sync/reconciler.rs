use crate::core::currency::ExchangeCurrency;
use crate::core::error::RateError;
use crate::core::price::{DailyBar, PriceSource, StoredBar, TRACKED_DAYS};
use crate::core::store::BarStore;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// What a history refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The stored window differed from the fetched one and was replaced.
    Replaced,
    /// The stored window already matched; nothing was written.
    Unchanged,
    /// A refresh for the same currency was already in flight; this one did
    /// nothing.
    Skipped,
}

/// Reconciles the stored daily-bar window with the remote one.
///
/// A refresh validates the fetched window, compares it against the stored
/// one by day timestamps and swaps the whole window in a single store
/// transaction when they differ. Any failure returns before the store is
/// touched, so the old window stays intact.
pub struct BarReconciler {
    source: Arc<dyn PriceSource>,
    store: Arc<dyn BarStore>,
    gates: Mutex<HashMap<ExchangeCurrency, Arc<Mutex<()>>>>,
}

impl BarReconciler {
    pub fn new(source: Arc<dyn PriceSource>, store: Arc<dyn BarStore>) -> Self {
        BarReconciler {
            source,
            store,
            gates: Mutex::new(HashMap::new()),
        }
    }

    #[instrument(name = "HistoryRefresh", skip(self), fields(currency = %currency))]
    pub async fn refresh(
        &self,
        currency: ExchangeCurrency,
    ) -> Result<RefreshOutcome, RateError> {
        let gate = {
            let mut gates = self.gates.lock().await;
            gates.entry(currency).or_default().clone()
        };
        let _guard = match gate.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Refresh already in flight, skipping");
                return Ok(RefreshOutcome::Skipped);
            }
        };

        let fetched = self.source.fetch_daily_bars(currency).await?;
        if fetched.len() != TRACKED_DAYS {
            return Err(RateError::InvalidResponse(format!(
                "expected {} daily bars, got {}",
                TRACKED_DAYS,
                fetched.len()
            )));
        }

        let stored = self.store.bars(currency).await?;
        if same_window(&stored, &fetched) {
            debug!("Stored window already current");
            return Ok(RefreshOutcome::Unchanged);
        }

        self.store
            .replace_bars(currency, &fetched, Utc::now())
            .await?;
        info!("Replaced stored window ({} bars)", fetched.len());
        Ok(RefreshOutcome::Replaced)
    }
}

/// Windows are the same when they cover the same set of day timestamps.
/// Completed days never change content, so day identity is enough.
fn same_window(stored: &[StoredBar], fetched: &[DailyBar]) -> bool {
    if stored.len() != fetched.len() {
        return false;
    }
    let stored_days: BTreeSet<i64> = stored.iter().map(|s| s.bar.time).collect();
    let fetched_days: BTreeSet<i64> = fetched.iter().map(|b| b.time).collect();
    stored_days == fetched_days
}
