//! Text formatting helpers for the command line.
//!
//! Everything here is presentation only: figures arrive at full precision and leave as
//! strings rounded to two decimals.

use crate::core::ledger::DayTotal;

/// Share of the budget already spent, in percent. 0 when there is no budget.
#[must_use]
pub fn budget_used_percent(spent: f64, budget: f64) -> f64 {
    if budget == 0.0 {
        return 0.0;
    }

    (spent / budget) * 100.0
}

/// Generates a progress bar string for visual representation.
///
/// Creates a text-based progress bar like: `[████████░░] 80.0%`
#[must_use]
pub fn format_progress_bar(progress_percent: f64, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped_progress = progress_percent.clamp(0.0, 100.0);

    // clamped_progress is in [0, 100] and length is small, so the product fits a usize.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let filled = ((clamped_progress / 100.0) * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    format!(
        "[{}{}] {progress_percent:.1}%",
        "█".repeat(filled),
        "░".repeat(empty)
    )
}

/// Formats a money amount like `"123.45 SEK"`.
#[must_use]
pub fn format_amount(amount: f64, currency: &str) -> String {
    format!("{amount:.2} {currency}")
}

/// Formats a quantity with two decimals.
#[must_use]
pub fn format_quantity(quantity: f64) -> String {
    format!("{quantity:.2}")
}

/// Formats a days-of-supply estimate, `-` when there is none.
#[must_use]
pub fn format_days_remaining(days: Option<f64>) -> String {
    days.map_or_else(|| "-".to_string(), |d| format!("{d:.1} days"))
}

const HEAT: [char; 5] = ['·', '░', '▒', '▓', '█'];

/// Renders a month of daily totals as one shade character per day.
#[must_use]
pub fn format_heatmap(days: &[DayTotal]) -> String {
    let max = days.iter().map(|d| d.quantity).fold(0.0, f64::max);
    days.iter()
        .map(|d| {
            if max <= 0.0 || d.quantity <= 0.0 {
                return HEAT[0];
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let level = ((d.quantity / max) * 4.0).ceil() as usize;
            HEAT[level.clamp(1, 4)]
        })
        .collect()
}
