use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use serde::{Deserialize, Serialize};

use super::{quadratic_form, vec_dot};
use crate::types::{Rate, Weight};

/// Return-to-risk ratio with a zero risk-free rate.
///
/// `Undefined` is a distinct state for a zero-volatility portfolio; it is
/// never replaced by zero or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum SharpeRatio {
    Defined(Decimal),
    Undefined,
}

impl SharpeRatio {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            SharpeRatio::Defined(v) => Some(*v),
            SharpeRatio::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, SharpeRatio::Defined(_))
    }
}

/// Return / risk summary of a weight vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub expected_return: Rate,
    /// `w' Sigma w`, clamped at zero.
    pub variance: Decimal,
    pub volatility: Decimal,
    pub sharpe_ratio: SharpeRatio,
    /// Raw variance was zero or negative before clamping.
    pub degenerate_volatility: bool,
}

/// Expected return, variance, volatility and Sharpe ratio of `weights`.
pub fn summarize(weights: &[Weight], mu: &[Rate], cov: &[Vec<Decimal>]) -> PortfolioSummary {
    let expected_return = vec_dot(weights, mu);
    let raw_variance = quadratic_form(cov, weights);
    let degenerate_volatility = raw_variance <= Decimal::ZERO;

    let variance = raw_variance.max(Decimal::ZERO);
    let volatility = variance.sqrt().unwrap_or(Decimal::ZERO);

    let sharpe_ratio = if volatility > Decimal::ZERO {
        SharpeRatio::Defined(expected_return / volatility)
    } else {
        SharpeRatio::Undefined
    };

    if degenerate_volatility {
        tracing::warn!(%raw_variance, "portfolio variance is not positive; Sharpe ratio undefined");
    }

    PortfolioSummary {
        expected_return,
        variance,
        volatility,
        sharpe_ratio,
        degenerate_volatility,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_single_asset_summary() {
        let cov = vec![vec![dec!(0.04), dec!(0)], vec![dec!(0), dec!(0.09)]];
        let summary = summarize(&[dec!(1), dec!(0)], &[dec!(0.10), dec!(0.20)], &cov);
        assert_eq!(summary.expected_return, dec!(0.10));
        assert_eq!(summary.variance, dec!(0.04));
        assert!((summary.volatility - dec!(0.2)).abs() < dec!(0.0000001));
        let sharpe = summary.sharpe_ratio.value().unwrap();
        assert!((sharpe - dec!(0.5)).abs() < dec!(0.000001));
        assert!(!summary.degenerate_volatility);
    }

    #[test]
    fn test_zero_variance_gives_undefined_sharpe() {
        let cov = vec![
            vec![dec!(0), dec!(0), dec!(0)],
            vec![dec!(0), dec!(0.06), dec!(0)],
            vec![dec!(0), dec!(0), dec!(0.64)],
        ];
        let summary = summarize(
            &[dec!(1), dec!(0), dec!(0)],
            &[dec!(0.10), dec!(0.15), dec!(0.50)],
            &cov,
        );
        assert_eq!(summary.variance, Decimal::ZERO);
        assert_eq!(summary.volatility, Decimal::ZERO);
        assert_eq!(summary.sharpe_ratio, SharpeRatio::Undefined);
        assert!(summary.degenerate_volatility);
        assert_eq!(summary.expected_return, dec!(0.10));
    }

    #[test]
    fn test_negative_rounding_variance_is_clamped() {
        // Not PSD: stands in for floating error on a near-singular matrix
        let cov = vec![
            vec![dec!(0.01), dec!(-0.0100001)],
            vec![dec!(-0.0100001), dec!(0.01)],
        ];
        let summary = summarize(&[dec!(0.5), dec!(0.5)], &[dec!(0.1), dec!(0.1)], &cov);
        assert_eq!(summary.variance, Decimal::ZERO);
        assert!(summary.degenerate_volatility);
        assert!(!summary.sharpe_ratio.is_defined());
    }

    #[test]
    fn test_sharpe_serialization_is_explicit() {
        let json = serde_json::to_value(SharpeRatio::Undefined).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "undefined" }));
    }
}
