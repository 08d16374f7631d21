use super::ui;
use crate::sync::RateTracker;
use anyhow::{bail, Result};

/// Runs one poll cycle and prints the resulting rate.
///
/// A cached rate from an earlier run is shown even when the fetch fails,
/// with the failure reported underneath it.
pub async fn run(tracker: &RateTracker) -> Result<()> {
    tracker.seed_from_cache().await;
    tracker.poll_once().await;

    let snapshot = tracker.snapshot();
    let Some(rate) = snapshot.current_rate else {
        match snapshot.error {
            Some(err) => bail!("{err}"),
            None => bail!("No data available."),
        }
    };

    println!(
        "Bitcoin Price: {} {}",
        ui::style_text(&format!("{:.2}", rate.rate), ui::StyleType::Value),
        rate.currency
    );
    if let Some(err) = &snapshot.error {
        println!(
            "{}",
            ui::style_text(
                &format!("Showing cached rate, fetch failed: {err}"),
                ui::StyleType::Error
            )
        );
    }
    Ok(())
}
