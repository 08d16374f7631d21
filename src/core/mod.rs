//! Core business logic abstractions

pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod price;
pub mod store;

// Re-export main types for cleaner imports
pub use currency::ExchangeCurrency;
pub use error::RateError;
pub use price::{CurrentRate, DailyBar, PriceSource, StoredBar};
pub use store::{BarStore, RateCache};
