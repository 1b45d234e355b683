use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use markowitz_core::market_data::{assemble_request, PriceSource, TickerSelection};
use markowitz_core::optimization::{self, AllocationPolicy};
use markowitz_core::AssetCategory;

use crate::input::prices::CsvPriceSource;

/// Arguments for allocating across stocks and cryptos from a price file
#[derive(Args)]
pub struct AllocateArgs {
    /// CSV of closing prices: a Date column, then one column per ticker
    #[arg(long)]
    pub prices: String,

    /// Comma-separated stock tickers (e.g. "AAPL,MSFT")
    #[arg(long, value_delimiter = ',')]
    pub stocks: Vec<String>,

    /// Comma-separated crypto tickers (e.g. "BTC-USD,ETH-USD")
    #[arg(long, value_delimiter = ',')]
    pub cryptos: Vec<String>,

    /// Annual target return as a decimal (0.20 = 20%)
    #[arg(long, allow_hyphen_values = true)]
    pub target_return: Decimal,

    /// Allow negative weights; per-asset bounds are dropped
    #[arg(long)]
    pub allow_short: bool,

    /// Maximum weight per asset
    #[arg(long, default_value = "0.35")]
    pub max_weight: Decimal,

    /// Minimum weight per asset
    #[arg(long)]
    pub min_asset_weight: Option<Decimal>,

    /// Minimum total weight in stocks
    #[arg(long)]
    pub min_stock_pct: Option<Decimal>,

    /// Minimum total weight in cryptos
    #[arg(long)]
    pub min_crypto_pct: Option<Decimal>,

    /// First price date to use (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last price date to use (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

pub fn run_allocate(args: AllocateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let selection = TickerSelection::normalized(&args.stocks, &args.cryptos);
    if selection.is_empty() {
        return Err("at least one ticker required in --stocks or --cryptos".into());
    }

    let mut policy = AllocationPolicy::new(args.target_return);
    policy.allow_short = args.allow_short;
    policy.max_weight = args.max_weight;
    policy.min_asset_weight = args.min_asset_weight;
    for (category, floor) in [
        (AssetCategory::Stock, args.min_stock_pct),
        (AssetCategory::Crypto, args.min_crypto_pct),
    ] {
        if let Some(floor) = floor.filter(|f| *f > Decimal::ZERO) {
            policy.category_minimums.insert(category, floor);
        }
    }

    let source = CsvPriceSource::open(&args.prices)?;
    let prices = source.fetch_prices(
        &selection.tickers(),
        args.start.unwrap_or(NaiveDate::MIN),
        args.end.unwrap_or(NaiveDate::MAX),
    )?;

    let request = assemble_request(&selection, &prices, policy)?;
    tracing::info!(
        assets = request.assets.len(),
        target = %args.target_return,
        "optimizing allocation"
    );
    let result = optimization::optimize(&request)?;
    Ok(serde_json::to_value(result)?)
}
