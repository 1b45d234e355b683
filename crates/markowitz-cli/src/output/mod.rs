pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

use crate::OutputFormat;
use markowitz_core::optimization::DISPLAY_WEIGHT_THRESHOLD;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Decimal fields arrive as strings; numbers are accepted too.
pub(crate) fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

/// Allocations worth showing: weight above the display threshold, largest first.
pub(crate) fn visible_allocations(result: &Value) -> Option<Vec<(&str, &str, Decimal)>> {
    let rows = result.get("allocations")?.as_array()?;
    let mut shown: Vec<(&str, &str, Decimal)> = rows
        .iter()
        .filter_map(|a| {
            Some((
                a.get("ticker")?.as_str()?,
                a.get("category")?.as_str()?,
                as_decimal(a.get("weight")?)?,
            ))
        })
        .filter(|(_, _, w)| *w > DISPLAY_WEIGHT_THRESHOLD)
        .collect();
    shown.sort_by(|a, b| b.2.cmp(&a.2));
    Some(shown)
}

/// Fraction rendered as a percentage with two decimals (0.1234 -> "12.34%").
pub(crate) fn percent(value: Decimal) -> String {
    format!("{:.2}%", rounded(value * Decimal::ONE_HUNDRED, 2))
}

/// Half-up rounding; `{:.N}` on a Decimal truncates.
fn rounded(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// `N/A` for an undefined Sharpe ratio.
pub(crate) fn sharpe_text(sharpe: &Value) -> String {
    match sharpe.get("state").and_then(Value::as_str) {
        Some("defined") => sharpe
            .get("value")
            .and_then(as_decimal)
            .map(|v| format!("{:.4}", rounded(v, 4)))
            .unwrap_or_else(|| "N/A".into()),
        _ => "N/A".into(),
    }
}
