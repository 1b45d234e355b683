use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::constraints::{build_constraints, AllocationLimits};
use super::metrics::{summarize, PortfolioSummary};
use super::solver::{solve_min_variance_with_report, SolverSettings};
use crate::error::MarkowitzError;
use crate::types::{with_metadata, ComputationOutput, Rate, Weight};
use crate::universe::{Asset, AssetCategory, Universe};
use crate::MarkowitzResult;

/// Allocations at or below this weight are hidden from display listings.
pub const DISPLAY_WEIGHT_THRESHOLD: Decimal = dec!(0.0001);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the caller wants from the allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    /// Annual expected return the portfolio must hit exactly.
    pub target_return: Rate,
    /// Allow negative weights and drop the per-asset bounds.
    #[serde(default)]
    pub allow_short: bool,
    /// Per-asset cap when shorting is off.
    #[serde(default = "default_max_weight")]
    pub max_weight: Weight,
    /// Per-asset floor when shorting is off (0 when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_asset_weight: Option<Weight>,
    /// Minimum total weight per category, e.g. `{"crypto": "0.10"}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub category_minimums: BTreeMap<AssetCategory, Weight>,
}

fn default_max_weight() -> Weight {
    Decimal::ONE
}

impl AllocationPolicy {
    pub fn new(target_return: Rate) -> Self {
        AllocationPolicy {
            target_return,
            allow_short: false,
            max_weight: default_max_weight(),
            min_asset_weight: None,
            category_minimums: BTreeMap::new(),
        }
    }

    pub fn limits(&self) -> AllocationLimits {
        AllocationLimits {
            allow_short: self.allow_short,
            min_asset_weight: self.min_asset_weight.unwrap_or(Decimal::ZERO),
            max_weight: self.max_weight,
        }
    }
}

/// Input to a minimum-variance optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    /// Ordered asset universe; every vector below follows this order.
    pub assets: Vec<Asset>,
    /// Annualized expected returns per asset.
    pub expected_returns: Vec<Rate>,
    /// Annualized N x N covariance matrix.
    pub covariance_matrix: Vec<Vec<Decimal>>,
    pub policy: AllocationPolicy,
    /// Solver starting point (uniform `1/N` when absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_weights: Option<Vec<Weight>>,
    #[serde(default)]
    pub solver: SolverSettings,
}

/// One asset's share of the optimal portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub ticker: String,
    pub category: AssetCategory,
    pub weight: Weight,
    /// Weight times expected return.
    pub contribution_to_return: Decimal,
}

/// Output of a minimum-variance optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutput {
    /// Weights for every asset in universe order, unrounded.
    pub allocations: Vec<AssetAllocation>,
    pub summary: PortfolioSummary,
    /// Total weight per category present in the universe.
    pub category_weights: BTreeMap<AssetCategory, Weight>,
    /// Names of the constraints the solver honoured, in order.
    pub constraints: Vec<String>,
    pub solver_status: String,
    pub solver_iterations: u32,
}

impl OptimizationOutput {
    /// Allocations above `threshold`, largest first.
    pub fn display_allocations(&self, threshold: Decimal) -> Vec<&AssetAllocation> {
        let mut shown: Vec<&AssetAllocation> = self
            .allocations
            .iter()
            .filter(|a| a.weight > threshold)
            .collect();
        shown.sort_by(|a, b| b.weight.cmp(&a.weight));
        shown
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find the minimum-variance allocation that meets the request's target return
/// and allocation policy.
///
/// The target return is not checked against the achievable range; an
/// unreachable target surfaces as [`MarkowitzError::InfeasibleConstraints`].
pub fn optimize(
    request: &OptimizationRequest,
) -> MarkowitzResult<ComputationOutput<OptimizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let universe = Universe::new(request.assets.clone())?;
    let n = universe.len();
    validate_request(request, n)?;

    let mu = &request.expected_returns;
    let sigma = &request.covariance_matrix;
    let policy = &request.policy;
    let limits = policy.limits();

    let (constraints, bounds) = build_constraints(
        &universe,
        mu,
        policy.target_return,
        &policy.category_minimums,
        &limits,
    );

    let report = solve_min_variance_with_report(
        mu,
        sigma,
        &constraints,
        &bounds,
        request.initial_weights.as_deref(),
        &request.solver,
    )?;

    let summary = summarize(&report.weights, mu, sigma);

    let allocations: Vec<AssetAllocation> = universe
        .assets()
        .iter()
        .zip(report.weights.iter())
        .zip(mu.iter())
        .map(|((asset, w), m)| AssetAllocation {
            ticker: asset.ticker.clone(),
            category: asset.category.clone(),
            weight: *w,
            contribution_to_return: *w * *m,
        })
        .collect();

    let mut category_weights: BTreeMap<AssetCategory, Weight> = BTreeMap::new();
    for a in &allocations {
        *category_weights
            .entry(a.category.clone())
            .or_insert(Decimal::ZERO) += a.weight;
    }

    // --- Warnings ---
    if summary.degenerate_volatility {
        warnings.push(
            "Degenerate volatility: portfolio variance is zero, Sharpe ratio is undefined".into(),
        );
    }
    for a in &allocations {
        if a.weight < -DISPLAY_WEIGHT_THRESHOLD {
            warnings.push(format!(
                "Short position: {} has weight {:.4}",
                a.ticker, a.weight
            ));
        }
    }

    let output = OptimizationOutput {
        allocations,
        summary,
        category_weights,
        constraints: constraints.iter().map(|c| c.name.clone()).collect(),
        solver_status: report.status,
        solver_iterations: report.iterations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Constrained minimum-variance (Markowitz) optimization",
        &serde_json::json!({
            "n_assets": n,
            "target_return": policy.target_return.to_string(),
            "allow_short": policy.allow_short,
            "max_weight": limits.max_weight.to_string(),
            "min_asset_weight": limits.min_asset_weight.to_string(),
            "risk_free_rate": "0",
            "initial_guess": if request.initial_weights.is_some() { "caller" } else { "uniform" },
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_request(request: &OptimizationRequest, n: usize) -> MarkowitzResult<()> {
    if request.expected_returns.len() != n {
        return Err(MarkowitzError::InvalidInput {
            field: "expected_returns".into(),
            reason: format!(
                "Expected {} returns but got {}",
                n,
                request.expected_returns.len()
            ),
        });
    }

    validate_covariance_matrix(&request.covariance_matrix, n)?;

    let policy = &request.policy;
    if policy.max_weight <= Decimal::ZERO || policy.max_weight > Decimal::ONE {
        return Err(MarkowitzError::InvalidInput {
            field: "policy.max_weight".into(),
            reason: format!("Must be in (0, 1], got {}", policy.max_weight),
        });
    }

    if let Some(min) = policy.min_asset_weight {
        if min < Decimal::ZERO || min >= policy.max_weight {
            return Err(MarkowitzError::InvalidInput {
                field: "policy.min_asset_weight".into(),
                reason: format!(
                    "Must be in [0, max_weight={}), got {}",
                    policy.max_weight, min
                ),
            });
        }
    }

    for (category, threshold) in &policy.category_minimums {
        if *threshold < Decimal::ZERO || *threshold > Decimal::ONE {
            return Err(MarkowitzError::InvalidInput {
                field: format!("policy.category_minimums.{}", category),
                reason: format!("Must be in [0, 1], got {}", threshold),
            });
        }
    }

    if let Some(ref w0) = request.initial_weights {
        if w0.len() != n {
            return Err(MarkowitzError::InvalidInput {
                field: "initial_weights".into(),
                reason: format!("Expected {} weights but got {}", n, w0.len()),
            });
        }
    }

    Ok(())
}

#[allow(clippy::needless_range_loop)]
fn validate_covariance_matrix(cov: &[Vec<Decimal>], n: usize) -> MarkowitzResult<()> {
    if cov.len() != n {
        return Err(MarkowitzError::InvalidInput {
            field: "covariance_matrix".into(),
            reason: format!("Expected {}x{} matrix but got {} rows", n, n, cov.len()),
        });
    }
    for (i, row) in cov.iter().enumerate() {
        if row.len() != n {
            return Err(MarkowitzError::InvalidInput {
                field: "covariance_matrix".into(),
                reason: format!("Row {} has {} columns, expected {}", i, row.len(), n),
            });
        }
    }
    let tolerance = dec!(0.0000001);
    for i in 0..n {
        for j in (i + 1)..n {
            if (cov[i][j] - cov[j][i]).abs() > tolerance {
                return Err(MarkowitzError::InvalidInput {
                    field: "covariance_matrix".into(),
                    reason: format!(
                        "Not symmetric: [{},{}]={} != [{},{}]={}",
                        i, j, cov[i][j], j, i, cov[j][i]
                    ),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::SharpeRatio;

    fn two_asset_request() -> OptimizationRequest {
        OptimizationRequest {
            assets: vec![Asset::stock("EQ"), Asset::crypto("BTC")],
            expected_returns: vec![dec!(0.08), dec!(0.40)],
            covariance_matrix: vec![
                vec![dec!(0.04), dec!(0.01)],
                vec![dec!(0.01), dec!(0.49)],
            ],
            policy: AllocationPolicy::new(dec!(0.16)),
            initial_weights: None,
            solver: SolverSettings::default(),
        }
    }

    // ------------------------------------------------------------------
    // 1. Two assets: the equalities pin the answer
    // ------------------------------------------------------------------
    #[test]
    fn test_two_assets_determined_by_equalities() {
        // w_btc * 0.40 + (1 - w_btc) * 0.08 = 0.16  =>  w_btc = 0.25
        let out = optimize(&two_asset_request()).unwrap();
        let w = &out.result.allocations;
        assert!((w[0].weight - dec!(0.75)).abs() < dec!(0.000001));
        assert!((w[1].weight - dec!(0.25)).abs() < dec!(0.000001));
        assert!(out.result.summary.sharpe_ratio.is_defined());
        assert_eq!(
            out.result.constraints,
            vec!["budget".to_string(), "target_return".to_string()]
        );
        assert_eq!(out.result.solver_status, "Solved");
    }

    #[test]
    fn test_category_weights_reported() {
        let out = optimize(&two_asset_request()).unwrap();
        let crypto = out.result.category_weights[&AssetCategory::Crypto];
        assert!((crypto - dec!(0.25)).abs() < dec!(0.000001));
    }

    // ------------------------------------------------------------------
    // 2. Validation
    // ------------------------------------------------------------------
    #[test]
    fn test_empty_assets_is_empty_universe() {
        let mut req = two_asset_request();
        req.assets.clear();
        req.expected_returns.clear();
        req.covariance_matrix.clear();
        assert!(matches!(optimize(&req), Err(MarkowitzError::EmptyUniverse)));
    }

    #[test]
    fn test_mismatched_returns_rejected() {
        let mut req = two_asset_request();
        req.expected_returns.push(dec!(0.1));
        assert!(matches!(
            optimize(&req),
            Err(MarkowitzError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_asymmetric_covariance_rejected() {
        let mut req = two_asset_request();
        req.covariance_matrix[0][1] = dec!(0.02);
        let err = optimize(&req).unwrap_err();
        assert!(err.to_string().contains("Not symmetric"));
    }

    #[test]
    fn test_max_weight_out_of_range_rejected() {
        let mut req = two_asset_request();
        req.policy.max_weight = dec!(1.5);
        assert!(optimize(&req).is_err());
        req.policy.max_weight = Decimal::ZERO;
        assert!(optimize(&req).is_err());
    }

    #[test]
    fn test_min_asset_weight_must_be_below_max() {
        let mut req = two_asset_request();
        req.policy.max_weight = dec!(0.5);
        req.policy.min_asset_weight = Some(dec!(0.5));
        let err = optimize(&req).unwrap_err();
        assert!(err.to_string().contains("min_asset_weight"));
    }

    #[test]
    fn test_category_threshold_above_one_rejected() {
        let mut req = two_asset_request();
        req.policy
            .category_minimums
            .insert(AssetCategory::Stock, dec!(1.2));
        assert!(matches!(
            optimize(&req),
            Err(MarkowitzError::InvalidInput { .. })
        ));
    }

    // ------------------------------------------------------------------
    // 3. Output helpers
    // ------------------------------------------------------------------
    #[test]
    fn test_display_allocations_hides_dust_and_sorts() {
        let output = OptimizationOutput {
            allocations: vec![
                AssetAllocation {
                    ticker: "A".into(),
                    category: AssetCategory::Stock,
                    weight: dec!(0.3),
                    contribution_to_return: dec!(0.03),
                },
                AssetAllocation {
                    ticker: "B".into(),
                    category: AssetCategory::Stock,
                    weight: dec!(0.00005),
                    contribution_to_return: Decimal::ZERO,
                },
                AssetAllocation {
                    ticker: "C".into(),
                    category: AssetCategory::Crypto,
                    weight: dec!(0.69995),
                    contribution_to_return: dec!(0.35),
                },
            ],
            summary: PortfolioSummary {
                expected_return: dec!(0.38),
                variance: dec!(0.1),
                volatility: dec!(0.316),
                sharpe_ratio: SharpeRatio::Defined(dec!(1.2)),
                degenerate_volatility: false,
            },
            category_weights: BTreeMap::new(),
            constraints: vec![],
            solver_status: "Solved".into(),
            solver_iterations: 9,
        };
        let shown: Vec<&str> = output
            .display_allocations(DISPLAY_WEIGHT_THRESHOLD)
            .iter()
            .map(|a| a.ticker.as_str())
            .collect();
        assert_eq!(shown, vec!["C", "A"]);
    }

    #[test]
    fn test_policy_defaults_from_json() {
        let policy: AllocationPolicy =
            serde_json::from_str(r#"{"target_return": "0.2"}"#).unwrap();
        assert_eq!(policy.max_weight, Decimal::ONE);
        assert!(!policy.allow_short);
        assert_eq!(policy.limits().min_asset_weight, Decimal::ZERO);
        assert!(policy.category_minimums.is_empty());
    }
}
