pub mod cli;
pub mod core;
pub mod providers;
pub mod store;
pub mod sync;

use crate::core::config::AppConfig;
use crate::core::currency::ExchangeCurrency;
use crate::core::price::PriceSource;
use crate::core::store::{BarStore, RateCache};
use anyhow::{Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Application commands, decoupled from the clap surface in `main`.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Rate { currency: Option<String> },
    History { currency: Option<String> },
    Refresh { currency: Option<String>, all: bool },
    Watch { currency: Option<String> },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Bitcoin tracker starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store = open_store(&config)?;

    match command {
        AppCommand::Rate { currency } => {
            let currency = resolve_currency(currency.as_deref(), &config)?;
            let tracker = build_tracker(&config, &store, currency);
            cli::rate::run(&tracker).await
        }
        AppCommand::History { currency } => {
            let currency = resolve_currency(currency.as_deref(), &config)?;
            cli::history::run(&*store, currency).await
        }
        AppCommand::Refresh { currency, all } => {
            let currency = resolve_currency(currency.as_deref(), &config)?;
            let tracker = build_tracker(&config, &store, currency);
            cli::refresh::run(&tracker, &*store, currency, all).await
        }
        AppCommand::Watch { currency } => {
            let currency = resolve_currency(currency.as_deref(), &config)?;
            let tracker = build_tracker(&config, &store, currency);
            cli::watch::run(Arc::new(tracker)).await
        }
    }
}

fn resolve_currency(requested: Option<&str>, config: &AppConfig) -> Result<ExchangeCurrency> {
    match requested {
        Some(code) => ExchangeCurrency::from_str(code),
        None => Ok(config.currency),
    }
}

fn open_store(config: &AppConfig) -> Result<Arc<store::TrackerStore>> {
    let data_path = config.default_data_path()?;
    std::fs::create_dir_all(&data_path)
        .with_context(|| format!("Failed to create data directory: {}", data_path.display()))?;
    let tracker_store = store::TrackerStore::open(data_path.join("store"))
        .with_context(|| format!("Failed to open store at {}", data_path.display()))?;
    Ok(Arc::new(tracker_store))
}

fn build_tracker(
    config: &AppConfig,
    store: &Arc<store::TrackerStore>,
    currency: ExchangeCurrency,
) -> sync::RateTracker {
    let provider = config.providers.cryptocompare.clone().unwrap_or_default();
    let api_key = provider.resolve_api_key();
    let source: Arc<dyn PriceSource> = Arc::new(providers::CryptoCompareSource::new(
        &provider.base_url,
        api_key,
    ));
    let cache: Arc<dyn RateCache> = store.clone();
    let bars: Arc<dyn BarStore> = store.clone();
    sync::RateTracker::new(source, cache, bars, currency, config.poll_interval())
}
