use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::MarkowitzError;
use crate::MarkowitzResult;

/// Closing prices of one ticker, aligned with [`PriceTable::dates`].
/// `None` marks a date with no price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub closes: Vec<Option<Decimal>>,
}

impl PriceSeries {
    pub fn observations(&self) -> usize {
        self.closes.iter().filter(|p| p.is_some()).count()
    }
}

/// Date-indexed table of closing prices, one column per ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub dates: Vec<NaiveDate>,
    pub series: Vec<PriceSeries>,
}

impl PriceTable {
    pub fn new(dates: Vec<NaiveDate>, series: Vec<PriceSeries>) -> MarkowitzResult<Self> {
        for s in &series {
            if s.closes.len() != dates.len() {
                return Err(MarkowitzError::InvalidInput {
                    field: format!("prices.{}", s.ticker),
                    reason: format!(
                        "Expected {} closes (one per date) but got {}",
                        dates.len(),
                        s.closes.len()
                    ),
                });
            }
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MarkowitzError::InvalidInput {
                field: "prices.dates".into(),
                reason: "Dates must be strictly increasing".into(),
            });
        }
        Ok(PriceTable { dates, series })
    }

    pub fn tickers(&self) -> Vec<String> {
        self.series.iter().map(|s| s.ticker.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.series.is_empty()
    }

    /// Rows with `start <= date <= end`; open ends keep everything on that side.
    pub fn between(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> PriceTable {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| start.map_or(true, |s| **d >= s) && end.map_or(true, |e| **d <= e))
            .map(|(i, _)| i)
            .collect();

        PriceTable {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            series: self
                .series
                .iter()
                .map(|s| PriceSeries {
                    ticker: s.ticker.clone(),
                    closes: keep.iter().map(|&i| s.closes[i]).collect(),
                })
                .collect(),
        }
    }

    /// Columns for the requested tickers, in the requested order. Unknown
    /// tickers are skipped.
    pub fn select(&self, tickers: &[String]) -> PriceTable {
        let mut seen = HashSet::new();
        PriceTable {
            dates: self.dates.clone(),
            series: tickers
                .iter()
                .filter(|t| seen.insert(t.as_str()))
                .filter_map(|t| self.series.iter().find(|s| &s.ticker == t))
                .cloned()
                .collect(),
        }
    }

    /// Drop tickers without a single price.
    pub fn drop_empty_series(mut self) -> PriceTable {
        self.series.retain(|s| s.observations() > 0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn table() -> PriceTable {
        PriceTable::new(
            vec![date(2), date(3), date(4)],
            vec![
                PriceSeries {
                    ticker: "AAA".into(),
                    closes: vec![Some(dec!(10)), Some(dec!(11)), Some(dec!(12))],
                },
                PriceSeries {
                    ticker: "ZZZ".into(),
                    closes: vec![None, None, None],
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = PriceTable::new(
            vec![date(2)],
            vec![PriceSeries {
                ticker: "AAA".into(),
                closes: vec![Some(dec!(1)), Some(dec!(2))],
            }],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unsorted_dates_rejected() {
        assert!(PriceTable::new(vec![date(3), date(2)], vec![]).is_err());
    }

    #[test]
    fn test_between_filters_rows() {
        let t = table().between(Some(date(3)), None);
        assert_eq!(t.dates, vec![date(3), date(4)]);
        assert_eq!(t.series[0].closes, vec![Some(dec!(11)), Some(dec!(12))]);
    }

    #[test]
    fn test_select_and_drop_empty() {
        let t = table().select(&["ZZZ".to_string(), "MISSING".to_string()]);
        assert_eq!(t.tickers(), vec!["ZZZ".to_string()]);
        let t = table().drop_empty_series();
        assert_eq!(t.tickers(), vec!["AAA".to_string()]);
    }

    #[test]
    fn test_select_follows_requested_order() {
        let t = table().select(&["ZZZ".to_string(), "AAA".to_string(), "ZZZ".to_string()]);
        assert_eq!(t.tickers(), vec!["ZZZ".to_string(), "AAA".to_string()]);
    }
}
