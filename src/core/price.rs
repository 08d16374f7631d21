//! Pricing abstractions and core types

use crate::core::currency::ExchangeCurrency;
use crate::core::error::RateError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of daily bars in the tracked history window.
pub const TRACKED_DAYS: usize = 14;

/// Seconds in one UTC day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// The only base asset the tracker handles.
pub const BASE_ASSET: &str = "BTC";

/// The most recently observed exchange rate, denominated in one currency.
///
/// Equality is exact `f64` equality; two rates are the same value only when
/// the remote reported the identical number for the identical currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentRate {
    pub rate: f64,
    pub currency: ExchangeCurrency,
}

/// One UTC day of OHLCV data. `time` is the Unix timestamp of the day start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume_from: f64,
    pub volume_to: f64,
}

impl DailyBar {
    /// Intraday change in percent; `None` when the open is zero.
    pub fn daily_change_pct(&self) -> Option<f64> {
        if self.open == 0.0 {
            return None;
        }
        Some((self.close - self.open) / self.open * 100.0)
    }

    /// The bar's day formatted as `dd.mm.yy`.
    pub fn display_date(&self) -> String {
        match DateTime::<Utc>::from_timestamp(self.time, 0) {
            Some(day) => day.format("%d.%m.%y").to_string(),
            None => self.time.to_string(),
        }
    }
}

/// A bar as kept in the local store, with the time its copy was written.
///
/// `last_update` is display and audit metadata only; reconciliation never
/// consults it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredBar {
    pub bar: DailyBar,
    pub last_update: DateTime<Utc>,
}

impl StoredBar {
    /// `last_update` formatted as `Www, dd.mm.yy, HH:MM`.
    pub fn formatted_update(&self) -> String {
        self.last_update.format("%a, %d.%m.%y, %H:%M").to_string()
    }
}

/// Unix timestamp of the last second (23:59:59) of the UTC day before `now`.
///
/// The history window always ends here, so the current partial day never
/// leaks into stored bars.
pub fn end_of_previous_day(now: DateTime<Utc>) -> i64 {
    now.date_naive().and_time(NaiveTime::MIN).and_utc().timestamp() - 1
}

/// Remote source of current and historical rates for the base asset.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Latest exchange rate of the base asset in `currency`.
    async fn fetch_current_rate(&self, currency: ExchangeCurrency) -> Result<f64, RateError>;

    /// Daily bars for the window ending with the previous UTC day.
    async fn fetch_daily_bars(
        &self,
        currency: ExchangeCurrency,
    ) -> Result<Vec<DailyBar>, RateError>;
}
