use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::error::MarkowitzError;
use crate::optimization::{AllocationPolicy, OptimizationRequest, SolverSettings};
use crate::statistics::{compute_statistics, PriceTable};
use crate::universe::{Asset, AssetCategory, Universe};
use crate::MarkowitzResult;

// ---------------------------------------------------------------------------
// Price source
// ---------------------------------------------------------------------------

/// Anything that can produce closing prices for a set of tickers.
///
/// Implementations return one series per requested ticker, in any order;
/// tickers the source knows nothing about may be omitted or returned with
/// every close missing. Both are dropped later.
pub trait PriceSource {
    fn fetch_prices(
        &self,
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> MarkowitzResult<PriceTable>;
}

// ---------------------------------------------------------------------------
// Ticker selection
// ---------------------------------------------------------------------------

/// Normalized tickers with their category, sorted alphabetically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerSelection {
    entries: BTreeMap<String, AssetCategory>,
}

impl TickerSelection {
    /// Trims and uppercases every ticker and drops blanks. A ticker listed as
    /// both a stock and a crypto is kept once, as a stock.
    pub fn normalized<S: AsRef<str>>(stocks: &[S], cryptos: &[S]) -> Self {
        let mut entries = BTreeMap::new();
        for t in cryptos.iter().filter_map(normalize) {
            entries.insert(t, AssetCategory::Crypto);
        }
        for t in stocks.iter().filter_map(normalize) {
            entries.insert(t, AssetCategory::Stock);
        }
        TickerSelection { entries }
    }

    pub fn tickers(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn category_of(&self, ticker: &str) -> Option<&AssetCategory> {
        self.entries.get(ticker)
    }

    pub fn assets(&self) -> Vec<Asset> {
        self.entries
            .iter()
            .map(|(t, c)| Asset::new(t.clone(), c.clone()))
            .collect()
    }
}

fn normalize<S: AsRef<str>>(raw: &S) -> Option<String> {
    let t = raw.as_ref().trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_uppercase())
    }
}

// ---------------------------------------------------------------------------
// Request assembly
// ---------------------------------------------------------------------------

/// Builds an [`OptimizationRequest`] from a selection and its price table.
///
/// Tickers with no usable prices are dropped from the universe together with
/// their category membership. The statistics are computed over the
/// remaining tickers and ordered like the universe.
pub fn assemble_request(
    selection: &TickerSelection,
    prices: &PriceTable,
    policy: AllocationPolicy,
) -> MarkowitzResult<OptimizationRequest> {
    if selection.is_empty() {
        return Err(MarkowitzError::EmptyUniverse);
    }

    let available = prices.select(&selection.tickers()).drop_empty_series();
    let with_data = available.tickers();
    let universe = Universe::new(selection.assets())?.retain_available(&with_data)?;

    let dropped: Vec<String> = selection
        .tickers()
        .into_iter()
        .filter(|t| !with_data.contains(t))
        .collect();
    if !dropped.is_empty() {
        tracing::warn!(tickers = ?dropped, "no price data, dropping from universe");
    }

    let ordered: Vec<String> = universe.tickers().iter().map(|t| t.to_string()).collect();
    let stats = compute_statistics(&available.select(&ordered))?;

    Ok(OptimizationRequest {
        assets: universe.assets().to_vec(),
        expected_returns: stats.mean,
        covariance_matrix: stats.covariance,
        policy,
        initial_weights: None,
        solver: SolverSettings::default(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
