//! Error taxonomy shared by the source, the stores and the sync paths

use crate::core::currency::ExchangeCurrency;
use thiserror::Error;

/// Failure classes the engine distinguishes.
///
/// Every failure aborts its operation before any state mutation; callers
/// keep serving the last known good values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    /// Transport never produced a response (offline, timeout, refused).
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The remote answered, but outside the contract (bad status, wrong shape).
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A well-formed response that lacks the requested currency.
    #[error("currency {0} missing from response")]
    CurrencyNotFound(ExchangeCurrency),

    /// The payload could not be decoded at all.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// The local store failed to read or write.
    #[error("storage failure: {0}")]
    StorageFailure(String),
}

impl From<reqwest::Error> for RateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RateError::DecodeFailure(err.to_string())
        } else {
            RateError::NetworkUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RateError {
    fn from(err: serde_json::Error) -> Self {
        RateError::DecodeFailure(err.to_string())
    }
}

impl From<fjall::Error> for RateError {
    fn from(err: fjall::Error) -> Self {
        RateError::StorageFailure(err.to_string())
    }
}
