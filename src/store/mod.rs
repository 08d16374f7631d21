pub mod memory;

use crate::core::currency::ExchangeCurrency;
use crate::core::error::RateError;
use crate::core::price::{CurrentRate, DailyBar, StoredBar};
use crate::core::store::{BarStore, RateCache};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

const RATE_PARTITION: &str = "current_rate";
const RATE_KEY: &[u8] = b"last";

/// Durable store backing both storage seams.
///
/// One fjall keyspace holds a `current_rate` partition with the single rate
/// slot and one partition per currency (`bars_eur`, ...) with that
/// currency's window, keyed by the bar time in big-endian bytes so
/// iteration is time-ordered.
pub struct TrackerStore {
    keyspace: Keyspace,
    rate: PartitionHandle,
}

impl TrackerStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RateError> {
        let keyspace = fjall::Config::new(path).open()?;
        let rate = keyspace.open_partition(RATE_PARTITION, PartitionCreateOptions::default())?;
        Ok(TrackerStore { keyspace, rate })
    }

    fn bars_partition(&self, currency: ExchangeCurrency) -> Result<PartitionHandle, RateError> {
        let name = format!("bars_{}", currency.code().to_lowercase());
        Ok(self
            .keyspace
            .open_partition(&name, PartitionCreateOptions::default())?)
    }
}

#[async_trait]
impl RateCache for TrackerStore {
    async fn get(&self) -> Option<CurrentRate> {
        let raw = match self.rate.get(RATE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                debug!("Rate slot read failed: {}", err);
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(rate) => Some(rate),
            Err(err) => {
                debug!("Rate slot holds an unreadable entry: {}", err);
                None
            }
        }
    }

    async fn set(&self, rate: CurrentRate) {
        let encoded = match serde_json::to_vec(&rate) {
            Ok(encoded) => encoded,
            Err(err) => {
                debug!("Rate slot encode failed: {}", err);
                return;
            }
        };
        if let Err(err) = self
            .rate
            .insert(RATE_KEY, encoded)
            .and_then(|()| self.keyspace.persist(PersistMode::Buffer))
        {
            debug!("Rate slot write failed: {}", err);
        }
    }
}

#[async_trait]
impl BarStore for TrackerStore {
    async fn bars(&self, currency: ExchangeCurrency) -> Result<Vec<StoredBar>, RateError> {
        let partition = self.bars_partition(currency)?;
        let mut bars = Vec::new();
        for entry in partition.iter() {
            let (_, value) = entry?;
            let stored: StoredBar = serde_json::from_slice(&value)
                .map_err(|err| RateError::StorageFailure(err.to_string()))?;
            bars.push(stored);
        }
        Ok(bars)
    }

    async fn replace_bars(
        &self,
        currency: ExchangeCurrency,
        bars: &[DailyBar],
        last_update: DateTime<Utc>,
    ) -> Result<(), RateError> {
        let partition = self.bars_partition(currency)?;

        let mut batch = self.keyspace.batch();
        for entry in partition.iter() {
            let (key, _) = entry?;
            batch.remove(&partition, key);
        }
        for bar in bars {
            let stored = StoredBar {
                bar: *bar,
                last_update,
            };
            let encoded = serde_json::to_vec(&stored)
                .map_err(|err| RateError::StorageFailure(err.to_string()))?;
            batch.insert(&partition, bar.time.to_be_bytes().to_vec(), encoded);
        }
        batch.commit()?;
        self.keyspace.persist(PersistMode::Buffer)?;

        debug!("Committed {} bars for {}", bars.len(), currency);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn bar(time: i64, close: f64) -> DailyBar {
        DailyBar {
            time,
            open: close - 100.0,
            high: close + 50.0,
            low: close - 200.0,
            close,
            volume_from: 1000.0,
            volume_to: 40_000_000.0,
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_rate_slot_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = TrackerStore::open(temp_dir.path()).unwrap();

        assert!(store.get().await.is_none());

        let rate = CurrentRate {
            rate: 42000.0,
            currency: ExchangeCurrency::Eur,
        };
        store.set(rate).await;
        assert_eq!(store.get().await, Some(rate));
    }

    #[tokio::test]
    async fn test_rate_slot_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let rate = CurrentRate {
            rate: 39999.5,
            currency: ExchangeCurrency::Usd,
        };

        {
            let store = TrackerStore::open(temp_dir.path()).unwrap();
            store.set(rate).await;
        }

        let reopened = TrackerStore::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.get().await, Some(rate));
    }

    #[tokio::test]
    async fn test_rate_slot_overwrites_unconditionally() {
        let temp_dir = TempDir::new().unwrap();
        let store = TrackerStore::open(temp_dir.path()).unwrap();

        store
            .set(CurrentRate {
                rate: 1.0,
                currency: ExchangeCurrency::Eur,
            })
            .await;
        let newer = CurrentRate {
            rate: 2.0,
            currency: ExchangeCurrency::Aud,
        };
        store.set(newer).await;
        assert_eq!(store.get().await, Some(newer));
    }

    #[tokio::test]
    async fn test_bars_empty_for_fresh_currency() {
        let temp_dir = TempDir::new().unwrap();
        let store = TrackerStore::open(temp_dir.path()).unwrap();

        let bars = store.bars(ExchangeCurrency::Cny).await.unwrap();
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn test_replace_bars_returns_time_ordered_window() {
        let temp_dir = TempDir::new().unwrap();
        let store = TrackerStore::open(temp_dir.path()).unwrap();

        // Out of order on purpose; iteration order comes from the keys.
        let bars = vec![bar(200_000, 3.0), bar(27_200, 1.0), bar(113_600, 2.0)];
        store
            .replace_bars(ExchangeCurrency::Eur, &bars, stamp())
            .await
            .unwrap();

        let stored = store.bars(ExchangeCurrency::Eur).await.unwrap();
        let times: Vec<i64> = stored.iter().map(|s| s.bar.time).collect();
        assert_eq!(times, vec![27_200, 113_600, 200_000]);
        assert!(stored.iter().all(|s| s.last_update == stamp()));
    }

    #[tokio::test]
    async fn test_replace_bars_is_a_full_swap() {
        let temp_dir = TempDir::new().unwrap();
        let store = TrackerStore::open(temp_dir.path()).unwrap();

        let old: Vec<DailyBar> = (0..3).map(|i| bar(i * 86_400, 100.0)).collect();
        store
            .replace_bars(ExchangeCurrency::Eur, &old, stamp())
            .await
            .unwrap();

        // Shifted by one day; only one timestamp overlaps.
        let new: Vec<DailyBar> = (1..4).map(|i| bar(i * 86_400, 200.0)).collect();
        store
            .replace_bars(ExchangeCurrency::Eur, &new, stamp())
            .await
            .unwrap();

        let stored = store.bars(ExchangeCurrency::Eur).await.unwrap();
        let times: Vec<i64> = stored.iter().map(|s| s.bar.time).collect();
        assert_eq!(times, vec![86_400, 172_800, 259_200]);
        assert!(stored.iter().all(|s| s.bar.close == 200.0));
    }

    #[tokio::test]
    async fn test_currency_partitions_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let store = TrackerStore::open(temp_dir.path()).unwrap();

        let eur = vec![bar(0, 100.0)];
        let usd = vec![bar(0, 300.0), bar(86_400, 301.0)];
        store
            .replace_bars(ExchangeCurrency::Eur, &eur, stamp())
            .await
            .unwrap();
        store
            .replace_bars(ExchangeCurrency::Usd, &usd, stamp())
            .await
            .unwrap();

        store
            .replace_bars(ExchangeCurrency::Eur, &[bar(86_400, 101.0)], stamp())
            .await
            .unwrap();

        let usd_after = store.bars(ExchangeCurrency::Usd).await.unwrap();
        assert_eq!(usd_after.len(), 2);
        assert!(usd_after.iter().all(|s| s.bar.close >= 300.0));
    }

    #[tokio::test]
    async fn test_bars_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let window: Vec<DailyBar> = (0..14).map(|i| bar(i * 86_400, 100.0 + i as f64)).collect();

        {
            let store = TrackerStore::open(temp_dir.path()).unwrap();
            store
                .replace_bars(ExchangeCurrency::Aud, &window, stamp())
                .await
                .unwrap();
        }

        let reopened = TrackerStore::open(temp_dir.path()).unwrap();
        let stored = reopened.bars(ExchangeCurrency::Aud).await.unwrap();
        assert_eq!(stored.len(), 14);
        assert_eq!(stored[13].bar.close, 113.0);
    }
}
