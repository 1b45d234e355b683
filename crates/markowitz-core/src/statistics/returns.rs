use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::prices::PriceTable;
use crate::error::MarkowitzError;
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::MarkowitzResult;

/// Trading periods per year used to annualize daily statistics.
pub const TRADING_PERIODS_PER_YEAR: u32 = 252;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Periodic simple returns; `rows[t][i]` is ticker `i`'s return in period `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnTable {
    pub tickers: Vec<String>,
    pub rows: Vec<Vec<Decimal>>,
}

/// Annualized expected returns and covariance for a set of tickers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatistics {
    pub tickers: Vec<String>,
    pub mean: Vec<Rate>,
    pub covariance: Vec<Vec<Decimal>>,
    /// Number of return periods the estimates are based on.
    pub observations: usize,
    pub periods_per_year: u32,
}

impl ReturnStatistics {
    /// Annualized volatility per ticker (square root of the covariance diagonal).
    pub fn volatilities(&self) -> Vec<Decimal> {
        self.covariance
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row[i]
                    .max(Decimal::ZERO)
                    .sqrt()
                    .unwrap_or(Decimal::ZERO)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simple returns `p_t / p_{t-1} - 1` for every ticker with at least one price.
///
/// Gaps are forward-filled from the last known price before differencing, and
/// any period where some ticker still has no return is dropped, so the
/// remaining rows are complete.
pub fn simple_returns(prices: &PriceTable) -> ReturnTable {
    let prices = prices.clone().drop_empty_series();
    let n_dates = prices.dates.len();

    let per_ticker: Vec<Vec<Option<Decimal>>> = prices
        .series
        .iter()
        .map(|s| {
            let mut last: Option<Decimal> = None;
            let filled: Vec<Option<Decimal>> = s
                .closes
                .iter()
                .map(|p| {
                    if p.is_some() {
                        last = *p;
                    }
                    last
                })
                .collect();

            (1..n_dates)
                .map(|t| match (filled[t - 1], filled[t]) {
                    (Some(prev), Some(cur)) if !prev.is_zero() => Some(cur / prev - Decimal::ONE),
                    _ => None,
                })
                .collect()
        })
        .collect();

    let rows: Vec<Vec<Decimal>> = (0..n_dates.saturating_sub(1))
        .filter_map(|t| per_ticker.iter().map(|r| r[t]).collect::<Option<Vec<_>>>())
        .collect();

    ReturnTable {
        tickers: prices.tickers(),
        rows,
    }
}

/// Annualized mean and sample covariance of a return table.
pub fn statistics_from_returns(
    returns: &ReturnTable,
    periods_per_year: u32,
) -> MarkowitzResult<ReturnStatistics> {
    let n = returns.tickers.len();
    let t = returns.rows.len();

    if n == 0 {
        return Err(MarkowitzError::EmptyUniverse);
    }
    if t < 2 {
        return Err(MarkowitzError::InsufficientData(format!(
            "At least 2 complete return periods required, got {}",
            t
        )));
    }
    if let Some(bad) = returns.rows.iter().position(|row| row.len() != n) {
        return Err(MarkowitzError::InvalidInput {
            field: "returns".into(),
            reason: format!("Row {} does not have {} columns", bad, n),
        });
    }

    let t_dec = Decimal::from(t as i64);
    let scale = Decimal::from(periods_per_year);

    let mean_periodic: Vec<Decimal> = (0..n)
        .map(|i| returns.rows.iter().map(|row| row[i]).sum::<Decimal>() / t_dec)
        .collect();

    let denom = Decimal::from((t - 1) as i64);
    let mut covariance = vec![vec![Decimal::ZERO; n]; n];
    for i in 0..n {
        for j in i..n {
            let s: Decimal = returns
                .rows
                .iter()
                .map(|row| (row[i] - mean_periodic[i]) * (row[j] - mean_periodic[j]))
                .sum();
            let c = s / denom * scale;
            covariance[i][j] = c;
            covariance[j][i] = c;
        }
    }

    Ok(ReturnStatistics {
        tickers: returns.tickers.clone(),
        mean: mean_periodic.iter().map(|m| *m * scale).collect(),
        covariance,
        observations: t,
        periods_per_year,
    })
}

/// Annualized statistics straight from a price table, using 252 periods a year.
pub fn compute_statistics(prices: &PriceTable) -> MarkowitzResult<ReturnStatistics> {
    let returns = simple_returns(prices);
    tracing::debug!(
        tickers = returns.tickers.len(),
        periods = returns.rows.len(),
        "computed simple returns"
    );
    statistics_from_returns(&returns, TRADING_PERIODS_PER_YEAR)
}

/// [`compute_statistics`] wrapped in the standard output envelope.
pub fn analyze_prices(prices: &PriceTable) -> MarkowitzResult<ComputationOutput<ReturnStatistics>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let dropped: Vec<String> = prices
        .series
        .iter()
        .filter(|s| s.observations() == 0)
        .map(|s| s.ticker.clone())
        .collect();
    if !dropped.is_empty() {
        warnings.push(format!("No price data for: {}", dropped.join(", ")));
    }

    let stats = compute_statistics(prices)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Annualized simple-return mean and sample covariance",
        &serde_json::json!({
            "periods_per_year": TRADING_PERIODS_PER_YEAR,
            "returns": "simple, forward-filled prices, incomplete periods dropped",
            "covariance": "sample (n - 1)",
        }),
        warnings,
        elapsed,
        stats,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::prices::PriceSeries;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn dates(n: u32) -> Vec<NaiveDate> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap())
            .collect()
    }

    fn series(ticker: &str, closes: Vec<Option<Decimal>>) -> PriceSeries {
        PriceSeries {
            ticker: ticker.into(),
            closes,
        }
    }

    #[test]
    fn test_simple_returns_basic() {
        let table = PriceTable::new(
            dates(3),
            vec![series("AAA", vec![Some(dec!(100)), Some(dec!(110)), Some(dec!(99))])],
        )
        .unwrap();
        let r = simple_returns(&table);
        assert_eq!(r.rows, vec![vec![dec!(0.1)], vec![dec!(-0.1)]]);
    }

    #[test]
    fn test_gaps_are_forward_filled() {
        // Weekend gap for the stock: its return over the gap is zero
        let table = PriceTable::new(
            dates(4),
            vec![
                series(
                    "STK",
                    vec![Some(dec!(10)), None, Some(dec!(10)), Some(dec!(11))],
                ),
                series(
                    "BTC",
                    vec![Some(dec!(100)), Some(dec!(110)), Some(dec!(121)), Some(dec!(121))],
                ),
            ],
        )
        .unwrap();
        let r = simple_returns(&table);
        assert_eq!(r.rows.len(), 3);
        assert_eq!(r.rows[0], vec![dec!(0), dec!(0.1)]);
        assert_eq!(r.rows[2], vec![dec!(0.1), dec!(0)]);
    }

    #[test]
    fn test_leading_missing_rows_dropped() {
        let table = PriceTable::new(
            dates(4),
            vec![
                series("OLD", vec![Some(dec!(1)), Some(dec!(2)), Some(dec!(2)), Some(dec!(1))]),
                series("NEW", vec![None, None, Some(dec!(5)), Some(dec!(10))]),
            ],
        )
        .unwrap();
        let r = simple_returns(&table);
        assert_eq!(r.rows, vec![vec![dec!(-0.5), dec!(1)]]);
    }

    #[test]
    fn test_series_without_data_is_dropped() {
        let table = PriceTable::new(
            dates(3),
            vec![
                series("AAA", vec![Some(dec!(1)), Some(dec!(2)), Some(dec!(3))]),
                series("NONE", vec![None, None, None]),
            ],
        )
        .unwrap();
        let r = simple_returns(&table);
        assert_eq!(r.tickers, vec!["AAA".to_string()]);
        assert_eq!(r.rows.len(), 2);
    }

    #[test]
    fn test_statistics_are_annualized() {
        let returns = ReturnTable {
            tickers: vec!["A".into(), "B".into()],
            rows: vec![
                vec![dec!(0.01), dec!(0.02)],
                vec![dec!(0.03), dec!(0.00)],
            ],
        };
        let stats = statistics_from_returns(&returns, 252).unwrap();
        // mean: 0.02, 0.01 per period
        assert_eq!(stats.mean, vec![dec!(5.04), dec!(2.52)]);
        // sample var A: ((-0.01)^2 + 0.01^2) / 1 = 0.0002; cov AB = -0.0002
        assert_eq!(stats.covariance[0][0], dec!(0.0504));
        assert_eq!(stats.covariance[0][1], dec!(-0.0504));
        assert_eq!(stats.covariance[1][0], stats.covariance[0][1]);
        assert_eq!(stats.observations, 2);
    }

    #[test]
    fn test_single_period_is_insufficient() {
        let returns = ReturnTable {
            tickers: vec!["A".into()],
            rows: vec![vec![dec!(0.01)]],
        };
        assert!(matches!(
            statistics_from_returns(&returns, 252),
            Err(MarkowitzError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_analyze_prices_warns_about_missing_tickers() {
        let table = PriceTable::new(
            dates(3),
            vec![
                series("AAA", vec![Some(dec!(1)), Some(dec!(2)), Some(dec!(3))]),
                series("GONE", vec![None, None, None]),
            ],
        )
        .unwrap();
        let out = analyze_prices(&table).unwrap();
        assert_eq!(out.warnings, vec!["No price data for: GONE".to_string()]);
        assert_eq!(out.result.tickers, vec!["AAA".to_string()]);
        assert_eq!(out.result.volatilities().len(), 1);
    }
}
