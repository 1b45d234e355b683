use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{as_decimal, percent, sharpe_text, visible_allocations};

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result(result);
                print_envelope_notes(map);
            } else {
                print_flat_object(value);
            }
        }
        _ => println!("{}", value),
    }
}

fn print_result(result: &Value) {
    if let Some(shown) = visible_allocations(result) {
        print_allocation(result, &shown);
    } else if result.get("covariance").is_some() {
        print_statistics(result);
    } else {
        print_flat_object(result);
    }
}

fn print_allocation(result: &Value, shown: &[(&str, &str, rust_decimal::Decimal)]) {
    let mut builder = Builder::default();
    builder.push_record(["Ticker", "Category", "Weight"]);
    for (ticker, category, weight) in shown {
        builder.push_record([ticker.to_string(), category.to_string(), percent(*weight)]);
    }
    println!("{}", Table::from(builder));

    let summary = &result["summary"];
    let mut metrics = Builder::default();
    metrics.push_record(["Metric", "Value"]);
    metrics.push_record([
        "Expected Annual Return".to_string(),
        as_decimal(&summary["expected_return"]).map(percent).unwrap_or_default(),
    ]);
    metrics.push_record([
        "Annual Volatility".to_string(),
        as_decimal(&summary["volatility"]).map(percent).unwrap_or_default(),
    ]);
    metrics.push_record([
        "Sharpe Ratio".to_string(),
        sharpe_text(&summary["sharpe_ratio"]),
    ]);
    if let Some(Value::Object(categories)) = result.get("category_weights") {
        for (category, weight) in categories {
            metrics.push_record([
                format!("Total {}", category),
                as_decimal(weight).map(percent).unwrap_or_default(),
            ]);
        }
    }
    println!("\n{}", Table::from(metrics));
}

fn print_statistics(result: &Value) {
    let tickers = result["tickers"].as_array().cloned().unwrap_or_default();
    let mut builder = Builder::default();
    builder.push_record(["Ticker", "Annual Return", "Annual Volatility"]);
    for (i, ticker) in tickers.iter().enumerate() {
        let mean = as_decimal(&result["mean"][i]).map(percent).unwrap_or_default();
        let vol = as_decimal(&result["covariance"][i][i])
            .and_then(|v| rust_decimal::MathematicalOps::sqrt(&v))
            .map(percent)
            .unwrap_or_default();
        builder.push_record([ticker.as_str().unwrap_or_default().to_string(), mean, vol]);
    }
    println!("{}", Table::from(builder));
    if let Some(n) = result.get("observations") {
        println!("\nReturn periods: {}", n);
    }
}

fn print_envelope_notes(envelope: &serde_json::Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
