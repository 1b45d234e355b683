use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use markowitz_core::statistics;

use crate::input::prices::CsvPriceSource;

/// Arguments for annualized return statistics
#[derive(Args)]
pub struct StatsArgs {
    /// CSV of closing prices: a Date column, then one column per ticker
    #[arg(long)]
    pub prices: String,

    /// Comma-separated tickers to include (default: every column)
    #[arg(long, value_delimiter = ',')]
    pub tickers: Vec<String>,

    /// First price date to use (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last price date to use (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

pub fn run_stats(args: StatsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let source = CsvPriceSource::open(&args.prices)?;

    let wanted: Vec<String> = args
        .tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    let table = if wanted.is_empty() {
        source.table().clone()
    } else {
        source.table().select(&wanted)
    };

    let result = statistics::analyze_prices(&table.between(args.start, args.end))?;
    Ok(serde_json::to_value(result)?)
}
