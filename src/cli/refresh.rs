use super::{history, ui};
use crate::core::currency::ExchangeCurrency;
use crate::core::store::BarStore;
use crate::sync::{RateTracker, RefreshOutcome};
use anyhow::{bail, Result};
use futures::future::join_all;

/// Reconciles the stored history with the remote window, for one currency or
/// for every supported one.
pub async fn run(
    tracker: &RateTracker,
    store: &dyn BarStore,
    currency: ExchangeCurrency,
    all: bool,
) -> Result<()> {
    if all {
        refresh_all(tracker).await
    } else {
        refresh_one(tracker, store, currency).await
    }
}

async fn refresh_one(
    tracker: &RateTracker,
    store: &dyn BarStore,
    currency: ExchangeCurrency,
) -> Result<()> {
    let spinner = ui::new_spinner(&format!("Refreshing {currency} history..."));
    let outcome = tracker.refresh_history(currency).await;
    spinner.finish_and_clear();

    let outcome = outcome?;
    println!("{currency}: {}", describe_outcome(outcome));

    let mut bars = store.bars(currency).await?;
    if bars.is_empty() {
        return Ok(());
    }
    bars.sort_by_key(|stored| std::cmp::Reverse(stored.bar.time));
    history::print_window(currency, &bars);
    Ok(())
}

async fn refresh_all(tracker: &RateTracker) -> Result<()> {
    let pb = ui::new_progress_bar(ExchangeCurrency::ALL.len() as u64, true);
    pb.set_message("Refreshing history...");

    let refresh_futures = ExchangeCurrency::ALL.iter().map(|&currency| {
        let pb_clone = pb.clone();
        async move {
            let outcome = tracker.refresh_history(currency).await;
            pb_clone.inc(1);
            (currency, outcome)
        }
    });
    let results = join_all(refresh_futures).await;
    pb.finish_and_clear();

    let mut failed = 0;
    for (currency, outcome) in results {
        match outcome {
            Ok(outcome) => println!("{currency}: {}", describe_outcome(outcome)),
            Err(err) => {
                failed += 1;
                println!(
                    "{currency}: {}",
                    ui::style_text(&err.to_string(), ui::StyleType::Error)
                );
            }
        }
    }
    if failed > 0 {
        bail!(
            "{failed} of {} currencies failed to refresh",
            ExchangeCurrency::ALL.len()
        );
    }
    Ok(())
}

fn describe_outcome(outcome: RefreshOutcome) -> &'static str {
    match outcome {
        RefreshOutcome::Replaced => "stored window replaced",
        RefreshOutcome::Unchanged => "already up to date",
        RefreshOutcome::Skipped => "refresh already running, skipped",
    }
}
