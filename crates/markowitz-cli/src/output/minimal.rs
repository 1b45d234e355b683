use serde_json::Value;

use super::visible_allocations;

/// Print just the answer: `TICKER weight` per visible allocation, or the
/// annualized mean per ticker for statistics.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(shown) = visible_allocations(result) {
        for (ticker, _, weight) in shown {
            println!("{} {}", ticker, weight.round_dp(6));
        }
        return;
    }

    if let (Some(Value::Array(tickers)), Some(Value::Array(means))) =
        (result.get("tickers"), result.get("mean"))
    {
        for (ticker, mean) in tickers.iter().zip(means) {
            println!("{} {}", format_minimal(ticker), format_minimal(mean));
        }
        return;
    }

    println!("{}", format_minimal(result));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
