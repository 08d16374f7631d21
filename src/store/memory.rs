use crate::core::currency::ExchangeCurrency;
use crate::core::error::RateError;
use crate::core::price::{CurrentRate, DailyBar, StoredBar};
use crate::core::store::{BarStore, RateCache};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory rate slot, mostly useful in tests and ad-hoc wiring.
#[derive(Default)]
pub struct MemoryRateCache {
    slot: Mutex<Option<CurrentRate>>,
}

impl MemoryRateCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateCache for MemoryRateCache {
    async fn get(&self) -> Option<CurrentRate> {
        *self.slot.lock().await
    }

    async fn set(&self, rate: CurrentRate) {
        debug!("Rate slot set: {} {}", rate.rate, rate.currency);
        *self.slot.lock().await = Some(rate);
    }
}

/// In-memory bar store keeping one window per currency.
#[derive(Default)]
pub struct MemoryBarStore {
    windows: Mutex<HashMap<ExchangeCurrency, Vec<StoredBar>>>,
}

impl MemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BarStore for MemoryBarStore {
    async fn bars(&self, currency: ExchangeCurrency) -> Result<Vec<StoredBar>, RateError> {
        let windows = self.windows.lock().await;
        Ok(windows.get(&currency).cloned().unwrap_or_default())
    }

    async fn replace_bars(
        &self,
        currency: ExchangeCurrency,
        bars: &[DailyBar],
        last_update: DateTime<Utc>,
    ) -> Result<(), RateError> {
        let mut stored: Vec<StoredBar> = bars
            .iter()
            .map(|bar| StoredBar {
                bar: *bar,
                last_update,
            })
            .collect();
        stored.sort_by_key(|s| s.bar.time);

        let mut windows = self.windows.lock().await;
        debug!("Replaced {} bars for {}", stored.len(), currency);
        windows.insert(currency, stored);
        Ok(())
    }
}
