//! Constrained minimum-variance optimization.
//!
//! - [`constraints`]: constraint and bound values plus the builder
//! - [`solver`]: quadratic program setup and the Clarabel call
//! - [`metrics`]: return / risk summary of a weight vector
//! - [`min_variance`]: request validation and the `optimize` entry point

pub mod constraints;
pub mod metrics;
pub mod min_variance;
pub mod solver;

use rust_decimal::Decimal;

pub use constraints::{
    build_constraints, category_indicator, AllocationLimits, AssetBounds, BoundSet,
    ConstraintKind, ConstraintSet, LinearConstraint, FEASIBILITY_TOLERANCE,
};
pub use metrics::{summarize, PortfolioSummary, SharpeRatio};
pub use min_variance::{
    optimize, AllocationPolicy, AssetAllocation, OptimizationOutput, OptimizationRequest,
    DISPLAY_WEIGHT_THRESHOLD,
};
pub use solver::{solve_min_variance, SolveReport, SolverSettings};

// ---------------------------------------------------------------------------
// Matrix helpers
// ---------------------------------------------------------------------------

/// Dot product.
pub(crate) fn vec_dot(a: &[Decimal], b: &[Decimal]) -> Decimal {
    a.iter().zip(b.iter()).map(|(x, y)| *x * *y).sum()
}

/// Matrix-vector multiplication.
pub(crate) fn mat_vec_multiply(mat: &[Vec<Decimal>], v: &[Decimal]) -> Vec<Decimal> {
    mat.iter().map(|row| vec_dot(row, v)).collect()
}

/// Quadratic form `v' * M * v`.
pub(crate) fn quadratic_form(mat: &[Vec<Decimal>], v: &[Decimal]) -> Decimal {
    vec_dot(v, &mat_vec_multiply(mat, v))
}

/// Equal weights for n assets.
pub(crate) fn equal_weights(n: usize) -> Vec<Decimal> {
    if n == 0 {
        return Vec::new();
    }
    let w = Decimal::ONE / Decimal::from(n as i64);
    vec![w; n]
}
