use markowitz_core::optimization::{
    optimize, summarize, AllocationPolicy, OptimizationOutput, OptimizationRequest,
    SolverSettings,
};
use markowitz_core::{Asset, AssetCategory, MarkowitzError};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// End-to-end minimum-variance allocation over a three-asset universe:
// two stocks (A, B) and one crypto (C) with uncorrelated returns.
// ===========================================================================

const TOL: Decimal = dec!(0.000001);
const SOLVER_TOL: Decimal = dec!(0.00001);

fn three_asset_request(target: Decimal) -> OptimizationRequest {
    let mut policy = AllocationPolicy::new(target);
    policy.max_weight = dec!(0.6);
    OptimizationRequest {
        assets: vec![Asset::stock("A"), Asset::stock("B"), Asset::crypto("C")],
        expected_returns: vec![dec!(0.10), dec!(0.15), dec!(0.50)],
        covariance_matrix: vec![
            vec![dec!(0.04), dec!(0), dec!(0)],
            vec![dec!(0), dec!(0.06), dec!(0)],
            vec![dec!(0), dec!(0), dec!(0.64)],
        ],
        policy,
        initial_weights: None,
        solver: SolverSettings::default(),
    }
}

fn weights(out: &OptimizationOutput) -> Vec<Decimal> {
    out.allocations.iter().map(|a| a.weight).collect()
}

fn assert_close(actual: &[Decimal], expected: &[Decimal], tol: Decimal) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (*a - *e).abs() < tol,
            "weight {} = {}, expected {} (tol {})",
            i,
            a,
            e,
            tol
        );
    }
}

fn assert_budget_and_target(out: &OptimizationOutput, target: Decimal) {
    let total: Decimal = out.allocations.iter().map(|a| a.weight).sum();
    assert!((total - Decimal::ONE).abs() < TOL, "sum of weights {}", total);
    assert!(
        (out.summary.expected_return - target).abs() < TOL,
        "expected return {} vs target {}",
        out.summary.expected_return,
        target
    );
}

// ---------------------------------------------------------------------------
// Feasible solves
// ---------------------------------------------------------------------------

#[test]
fn test_matches_closed_form_when_bounds_inactive() {
    // Lagrangian solution of min w'Σw s.t. 1'w = 1, μ'w = 0.20 with diagonal Σ:
    // w = (8/23, 74/161, 31/161); every weight sits strictly inside [0, 0.6].
    let out = optimize(&three_asset_request(dec!(0.20))).unwrap().result;
    assert_close(
        &weights(&out),
        &[dec!(0.3478261), dec!(0.4596273), dec!(0.1925466)],
        SOLVER_TOL,
    );
    assert_budget_and_target(&out, dec!(0.20));
    assert_eq!(out.solver_status, "Solved");
}

#[test]
fn test_weights_respect_bounds_without_shorting() {
    let out = optimize(&three_asset_request(dec!(0.30))).unwrap().result;
    assert_budget_and_target(&out, dec!(0.30));
    for a in &out.allocations {
        assert!(a.weight >= -TOL, "{} below zero: {}", a.ticker, a.weight);
        assert!(a.weight <= dec!(0.6) + TOL, "{} above cap: {}", a.ticker, a.weight);
    }
}

#[test]
fn test_min_asset_weight_floor_binds() {
    // Unconstrained C would be ~0.1925; the 0.2 floor pins it, leaving
    // A + B = 0.8 and 0.1A + 0.15B = 0.10, so A = B = 0.4.
    let mut req = three_asset_request(dec!(0.20));
    req.policy.min_asset_weight = Some(dec!(0.2));
    let out = optimize(&req).unwrap().result;
    assert_close(&weights(&out), &[dec!(0.4), dec!(0.4), dec!(0.2)], SOLVER_TOL);
    for a in &out.allocations {
        assert!(a.weight >= dec!(0.2) - TOL);
    }
}

#[test]
fn test_crypto_minimum_and_cap_respected() {
    // Without the floor C would hold ~0.263 at a 0.23 target; with a 0.30
    // crypto floor the cheapest point is C = 0.3, B = 0.2, A = 0.5.
    let mut req = three_asset_request(dec!(0.23));
    req.policy
        .category_minimums
        .insert(AssetCategory::Crypto, dec!(0.30));
    let out = optimize(&req).unwrap().result;

    assert_close(&weights(&out), &[dec!(0.5), dec!(0.2), dec!(0.3)], SOLVER_TOL);
    assert_budget_and_target(&out, dec!(0.23));
    let crypto = out.category_weights[&AssetCategory::Crypto];
    assert!(crypto >= dec!(0.30) - TOL);
    assert!(crypto <= dec!(0.6) + TOL);
    assert_eq!(
        out.constraints,
        vec![
            "budget".to_string(),
            "target_return".to_string(),
            "category_minimum:crypto".to_string(),
        ]
    );
}

#[test]
fn test_stock_minimum_holds_alongside_crypto_minimum() {
    let mut req = three_asset_request(dec!(0.25));
    req.policy
        .category_minimums
        .insert(AssetCategory::Stock, dec!(0.5));
    req.policy
        .category_minimums
        .insert(AssetCategory::Crypto, dec!(0.1));
    let out = optimize(&req).unwrap().result;
    assert_budget_and_target(&out, dec!(0.25));
    assert!(out.category_weights[&AssetCategory::Stock] >= dec!(0.5) - TOL);
    assert!(out.category_weights[&AssetCategory::Crypto] >= dec!(0.1) - TOL);
}

#[test]
fn test_floor_for_absent_category_is_ignored() {
    let mut req = three_asset_request(dec!(0.20));
    req.policy
        .category_minimums
        .insert(AssetCategory::Other("bond".into()), dec!(0.5));
    let out = optimize(&req).unwrap().result;
    assert_eq!(out.constraints.len(), 2);
    assert_close(
        &weights(&out),
        &[dec!(0.3478261), dec!(0.4596273), dec!(0.1925466)],
        SOLVER_TOL,
    );
}

#[test]
fn test_same_answer_from_different_starting_points() {
    let uniform = optimize(&three_asset_request(dec!(0.20))).unwrap().result;

    let mut req = three_asset_request(dec!(0.20));
    req.initial_weights = Some(vec![dec!(0.2), dec!(0.5), dec!(0.3)]);
    let seeded = optimize(&req).unwrap().result;

    assert_close(&weights(&seeded), &weights(&uniform), SOLVER_TOL);
}

#[test]
fn test_short_selling_reaches_target_above_every_mean() {
    // 0.60 is above every expected return, so it needs a short in A.
    let mut req = three_asset_request(dec!(0.60));
    req.policy.allow_short = true;
    let out = optimize(&req).unwrap();

    assert_budget_and_target(&out.result, dec!(0.60));
    let w = weights(&out.result);
    assert_close(&w, &[dec!(-1.0434783), dec!(0.9068323), dec!(1.1366460)], SOLVER_TOL);
    assert!(out
        .warnings
        .iter()
        .any(|msg| msg.starts_with("Short position: A")));
}

// ---------------------------------------------------------------------------
// Infeasible requests
// ---------------------------------------------------------------------------

#[test]
fn test_target_above_reachable_range_is_infeasible() {
    let err = optimize(&three_asset_request(dec!(0.90))).unwrap_err();
    assert!(matches!(err, MarkowitzError::InfeasibleConstraints { .. }));
    assert!(err.suggests_relaxation());
}

#[test]
fn test_crypto_floor_incompatible_with_low_target() {
    // A 0.30 crypto floor keeps the return at or above 0.225 under the 0.6 cap.
    let mut req = three_asset_request(dec!(0.20));
    req.policy
        .category_minimums
        .insert(AssetCategory::Crypto, dec!(0.30));
    assert!(matches!(
        optimize(&req),
        Err(MarkowitzError::InfeasibleConstraints { .. })
    ));
}

// ---------------------------------------------------------------------------
// Degenerate volatility
// ---------------------------------------------------------------------------

#[test]
fn test_zero_variance_portfolio_has_undefined_sharpe() {
    let mu = vec![dec!(0.05), dec!(0.10), dec!(0.20)];
    let cov = vec![
        vec![dec!(0), dec!(0), dec!(0)],
        vec![dec!(0), dec!(0.04), dec!(0)],
        vec![dec!(0), dec!(0), dec!(0.09)],
    ];
    let summary = summarize(&[dec!(1), dec!(0), dec!(0)], &mu, &cov);

    assert_eq!(summary.expected_return, dec!(0.05));
    assert_eq!(summary.volatility, Decimal::ZERO);
    assert!(summary.degenerate_volatility);
    assert_eq!(summary.sharpe_ratio.value(), None);
}

#[test]
fn test_output_serializes_with_string_decimals() {
    let out = optimize(&three_asset_request(dec!(0.20))).unwrap();
    let json = serde_json::to_value(&out).unwrap();
    assert!(json["result"]["allocations"][0]["weight"].is_string());
    assert_eq!(json["result"]["allocations"][2]["category"], "crypto");
    assert_eq!(json["metadata"]["version"], env!("CARGO_PKG_VERSION"));
}
