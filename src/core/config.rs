use crate::core::currency::ExchangeCurrency;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CryptoCompareConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl CryptoCompareConfig {
    /// Configured key if present, otherwise the `CRYPTOCOMPARE_API_KEY`
    /// environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("CRYPTOCOMPARE_API_KEY").ok())
    }
}

impl Default for CryptoCompareConfig {
    fn default() -> Self {
        CryptoCompareConfig {
            base_url: "https://min-api.cryptocompare.com".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub cryptocompare: Option<CryptoCompareConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            cryptocompare: Some(CryptoCompareConfig::default()),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Currency the tracker follows on startup.
    #[serde(default = "default_currency")]
    pub currency: ExchangeCurrency,
    /// Seconds between live polls of the current rate.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub data_path: Option<String>,
}

fn default_currency() -> ExchangeCurrency {
    ExchangeCurrency::Eur
}

fn default_poll_interval_secs() -> u64 {
    1
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "codito", "btcwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "codito", "btcwatch")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Poll cadence as a duration, clamped to at least one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
currency: "USD"
poll_interval_secs: 5
providers:
  cryptocompare:
    base_url: "http://example.com/api"
    api_key: "k-123"
data_path: "/tmp/btcwatch-test"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.currency, ExchangeCurrency::Usd);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.data_path.as_deref(), Some("/tmp/btcwatch-test"));

        let provider = config.providers.cryptocompare.expect("provider config");
        assert_eq!(provider.base_url, "http://example.com/api");
        assert_eq!(provider.api_key.as_deref(), Some("k-123"));
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("data_path: null").expect("minimal config");
        assert_eq!(config.currency, ExchangeCurrency::Eur);
        assert_eq!(config.poll_interval_secs, 1);
        assert!(config.data_path.is_none());

        let provider = config.providers.cryptocompare.expect("default provider");
        assert_eq!(provider.base_url, "https://min-api.cryptocompare.com");
        assert!(provider.api_key.is_none());
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config: AppConfig =
            serde_yaml::from_str("poll_interval_secs: 0").expect("config with zero interval");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_unknown_currency_fails_to_parse() {
        let result: Result<AppConfig, _> = serde_yaml::from_str("currency: \"GBP\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_data_path_wins() {
        let config: AppConfig =
            serde_yaml::from_str("data_path: \"/var/lib/btcwatch\"").expect("config");
        let path = config.default_data_path().expect("data path");
        assert_eq!(path, PathBuf::from("/var/lib/btcwatch"));
    }
}
