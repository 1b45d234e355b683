use serde_json::Value;
use std::io;

/// Write output as CSV to stdout.
///
/// Allocations become one row per asset, statistics one row per ticker with
/// its covariance row; anything else is written as field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value.get("result").unwrap_or(value);
    if let Some(Value::Array(rows)) = result.get("allocations") {
        let _ = wtr.write_record(["ticker", "category", "weight", "contribution_to_return"]);
        for row in rows {
            let _ = wtr.write_record([
                format_csv_value(&row["ticker"]),
                format_csv_value(&row["category"]),
                format_csv_value(&row["weight"]),
                format_csv_value(&row["contribution_to_return"]),
            ]);
        }
    } else if let (Some(Value::Array(tickers)), Some(Value::Array(cov))) =
        (result.get("tickers"), result.get("covariance"))
    {
        let mut header = vec!["ticker".to_string(), "mean".to_string()];
        header.extend(tickers.iter().map(format_csv_value));
        let _ = wtr.write_record(&header);
        for (i, ticker) in tickers.iter().enumerate() {
            let mut record = vec![format_csv_value(ticker), format_csv_value(&result["mean"][i])];
            if let Some(Value::Array(cells)) = cov.get(i) {
                record.extend(cells.iter().map(format_csv_value));
            }
            let _ = wtr.write_record(&record);
        }
    } else if let Value::Object(map) = result {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in map {
            let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
        }
    } else {
        let _ = wtr.write_record([&format_csv_value(result)]);
    }

    let _ = wtr.flush();
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
