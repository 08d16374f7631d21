use super::ui;
use crate::sync::{RateTracker, TrackerSnapshot};
use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use tracing::warn;

/// Polls the rate live, printing a line for every published change until
/// Ctrl-C. A history refresh runs once in the background at startup.
pub async fn run(tracker: Arc<RateTracker>) -> Result<()> {
    let mut rx = tracker.subscribe();

    // The poll loop seeds the cached rate before its first fetch.
    tracker.start_live_polling().await;

    let refresh_tracker = Arc::clone(&tracker);
    let currency = tracker.currency();
    tokio::spawn(async move {
        if let Err(err) = refresh_tracker.refresh_history(currency).await {
            warn!("History refresh failed: {err}");
        }
    });

    println!(
        "Watching Bitcoin in {} (press Ctrl-C to stop)...",
        tracker.currency()
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = render_status(&rx.borrow_and_update());
                println!("{} {line}", Local::now().format("%H:%M:%S"));
            }
        }
    }

    tracker.stop_live_polling().await;
    println!("Stopped.");
    Ok(())
}

/// One status line for the latest snapshot.
fn render_status(snapshot: &TrackerSnapshot) -> String {
    let rate = match snapshot.current_rate {
        Some(rate) => ui::style_text(
            &format!("{:.2} {}", rate.rate, rate.currency),
            ui::StyleType::Value,
        ),
        None => ui::style_text("no rate yet", ui::StyleType::Subtle),
    };

    let mut line = format!("Bitcoin Price: {rate}");
    if snapshot.history_loading {
        line.push(' ');
        line.push_str(&ui::style_text("[syncing history]", ui::StyleType::Subtle));
    } else if let Some(synced) = snapshot.last_synced {
        line.push(' ');
        line.push_str(&ui::style_text(
            &format!("[history synced {}]", synced.format("%H:%M")),
            ui::StyleType::Subtle,
        ));
    }
    if let Some(err) = &snapshot.error {
        line.push(' ');
        line.push_str(&ui::style_text(&format!("({err})"), ui::StyleType::Error));
    }
    line
}
