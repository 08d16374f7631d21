use super::ui;
use crate::core::currency::ExchangeCurrency;
use crate::core::price::StoredBar;
use crate::core::store::BarStore;
use anyhow::Result;
use comfy_table::{Cell, Table};

/// Shows the stored history window for one currency, without touching the
/// network.
pub async fn run(store: &dyn BarStore, currency: ExchangeCurrency) -> Result<()> {
    let mut bars = store.bars(currency).await?;
    if bars.is_empty() {
        println!("No stored history for {currency}. Run the refresh command first.");
        return Ok(());
    }

    bars.sort_by_key(|stored| std::cmp::Reverse(stored.bar.time));
    print_window(currency, &bars);
    Ok(())
}

/// Prints a stored window as a table. Expects bars ordered newest day first,
/// the way the app lists them.
pub(super) fn print_window(currency: ExchangeCurrency, bars: &[StoredBar]) {
    println!(
        "\nBitcoin History: {}\n",
        ui::style_text(currency.code(), ui::StyleType::Title)
    );
    println!("{}", window_table(bars));
    if let Some(newest) = bars.first() {
        println!(
            "\n{}",
            ui::style_text(
                &format!("Last Updated: {}", newest.formatted_update()),
                ui::StyleType::Subtle
            )
        );
    }
}

fn window_table(bars: &[StoredBar]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Open"),
        ui::header_cell("High"),
        ui::header_cell("Low"),
        ui::header_cell("Close"),
        ui::header_cell("Change"),
        ui::header_cell("Volume (BTC)"),
    ]);

    for stored in bars {
        let bar = stored.bar;
        let change = match bar.daily_change_pct() {
            Some(pct) => ui::change_cell(pct),
            None => ui::na_cell(false),
        };
        table.add_row(vec![
            Cell::new(bar.display_date()),
            ui::price_cell(bar.open),
            ui::price_cell(bar.high),
            ui::price_cell(bar.low),
            ui::price_cell(bar.close),
            change,
            ui::price_cell(bar.volume_from),
        ]);
    }
    table
}
