use crate::core::currency::ExchangeCurrency;
use crate::core::error::RateError;
use crate::core::price::{CurrentRate, StoredBar};
use chrono::{DateTime, Utc};

/// Everything the tracker currently knows, published as one value.
///
/// Consumers receive whole snapshots over a watch channel, so a currency
/// switch and the bars belonging to it can never be observed half-applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSnapshot {
    /// The currency being tracked.
    pub currency: ExchangeCurrency,
    /// Most recently accepted rate; survives later fetch failures.
    pub current_rate: Option<CurrentRate>,
    /// Failure reported by the most recent fetch, cleared on the next success.
    pub error: Option<RateError>,
    /// Stored daily bars for `currency`, oldest first.
    pub bars: Vec<StoredBar>,
    /// True while a history refresh for `currency` is running.
    pub history_loading: bool,
    /// When a history refresh for `currency` last completed without error.
    pub last_synced: Option<DateTime<Utc>>,
    /// True while the live poll loop is running.
    pub polling: bool,
}

impl TrackerSnapshot {
    pub fn new(currency: ExchangeCurrency) -> Self {
        TrackerSnapshot {
            currency,
            current_rate: None,
            error: None,
            bars: Vec::new(),
            history_loading: false,
            last_synced: None,
            polling: false,
        }
    }
}
