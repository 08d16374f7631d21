//! Storage seams for the cached rate and the daily-bar windows

use crate::core::currency::ExchangeCurrency;
use crate::core::error::RateError;
use crate::core::price::{CurrentRate, DailyBar, StoredBar};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Single-slot durable cache for the most recent rate.
///
/// The slot carries no error channel: a failed read degrades to an absent
/// value and a failed write is dropped, both logged by the implementation.
#[async_trait]
pub trait RateCache: Send + Sync {
    /// Last stored rate, or `None` on first run or an unreadable slot.
    async fn get(&self) -> Option<CurrentRate>;

    /// Overwrites the slot unconditionally.
    async fn set(&self, rate: CurrentRate);
}

/// Durable home of the per-currency daily-bar windows.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Stored bars for one currency, ascending by bar time.
    async fn bars(&self, currency: ExchangeCurrency) -> Result<Vec<StoredBar>, RateError>;

    /// Replaces the whole window for one currency in a single transaction.
    ///
    /// Deleting the old bars and inserting the new ones commit together;
    /// a reader never observes the window partially swapped.
    async fn replace_bars(
        &self,
        currency: ExchangeCurrency,
        bars: &[DailyBar],
        last_update: DateTime<Utc>,
    ) -> Result<(), RateError>;
}
