//! Quote currency abstractions

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// The closed set of quote currencies the tracker supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExchangeCurrency {
    Usd,
    Eur,
    Cny,
    Aud,
}

impl ExchangeCurrency {
    pub const ALL: [ExchangeCurrency; 4] = [
        ExchangeCurrency::Usd,
        ExchangeCurrency::Eur,
        ExchangeCurrency::Cny,
        ExchangeCurrency::Aud,
    ];

    /// Uppercase code as used on the wire and in display.
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeCurrency::Usd => "USD",
            ExchangeCurrency::Eur => "EUR",
            ExchangeCurrency::Cny => "CNY",
            ExchangeCurrency::Aud => "AUD",
        }
    }
}

impl Display for ExchangeCurrency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for ExchangeCurrency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(ExchangeCurrency::Usd),
            "EUR" => Ok(ExchangeCurrency::Eur),
            "CNY" => Ok(ExchangeCurrency::Cny),
            "AUD" => Ok(ExchangeCurrency::Aud),
            _ => Err(anyhow::anyhow!("Unsupported currency: {}", s)),
        }
    }
}
