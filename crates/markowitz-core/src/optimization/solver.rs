//! Minimum-variance quadratic program backed by the Clarabel interior-point solver.
//!
//! The problem handed to Clarabel is
//!
//! ```text
//! minimize    (1/2) d' P d + q' d
//! subject to  A d + s = b,   s in {0}^m_eq x R+^m_ineq
//! ```
//!
//! with `w = x0 + d`, `P = 2 * Sigma` and `q = P * x0`, which is `w' Sigma w` up
//! to a constant. Writing the program in displacements from the starting point
//! `x0` centres the solver's own initialization on that point.
//!
//! Row layout of `A`: equalities, then inequalities (`g(w) >= 0` becomes
//! `-a'd + s = a'x0 - c`), then lower bounds, then upper bounds.
//!
//! With a covariance matrix that is positive definite on the feasible subspace
//! the objective is strictly convex, so the minimizer is unique and does not
//! depend on `x0`.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::constraints::{BoundSet, ConstraintKind, ConstraintSet, FEASIBILITY_TOLERANCE};
use super::{equal_weights, quadratic_form};
use crate::error::MarkowitzError;
use crate::types::{Rate, Weight};
use crate::MarkowitzResult;

// ---------------------------------------------------------------------------
// Settings and report
// ---------------------------------------------------------------------------

/// Solver knobs. Defaults suit universes of tens of assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Iteration cap; hitting it is reported as a failed solve.
    #[serde(default = "default_max_iter")]
    pub max_iter: u32,
    /// Wall-clock limit in seconds (no limit when absent).
    #[serde(default)]
    pub time_limit_secs: Option<f64>,
    #[serde(default = "default_tolerance")]
    pub tol_gap_abs: f64,
    #[serde(default = "default_tolerance")]
    pub tol_gap_rel: f64,
    #[serde(default = "default_tolerance")]
    pub tol_feas: f64,
    /// Print Clarabel's iteration log to stdout.
    #[serde(default)]
    pub verbose: bool,
}

fn default_max_iter() -> u32 {
    200
}

fn default_tolerance() -> f64 {
    1e-8
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            max_iter: default_max_iter(),
            time_limit_secs: None,
            tol_gap_abs: default_tolerance(),
            tol_gap_rel: default_tolerance(),
            tol_feas: default_tolerance(),
            verbose: false,
        }
    }
}

/// A converged solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveReport {
    /// Optimal weights, exactly as returned by the solver.
    pub weights: Vec<Weight>,
    /// Clarabel's status label.
    pub status: String,
    pub iterations: u32,
    pub solve_time_secs: f64,
    /// `w' Sigma w` at the optimum.
    pub variance: Decimal,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Minimize `w' Sigma w` subject to `constraints` and `bounds`.
///
/// `initial_guess` defaults to the uniform allocation `1/N`.
pub fn solve_min_variance(
    mu: &[Rate],
    cov: &[Vec<Decimal>],
    constraints: &ConstraintSet,
    bounds: &BoundSet,
    initial_guess: Option<&[Weight]>,
    settings: &SolverSettings,
) -> MarkowitzResult<Vec<Weight>> {
    solve_min_variance_with_report(mu, cov, constraints, bounds, initial_guess, settings)
        .map(|report| report.weights)
}

/// Same as [`solve_min_variance`], also returning solver diagnostics.
#[tracing::instrument(skip_all, fields(n_assets = mu.len(), n_constraints = constraints.len()))]
pub fn solve_min_variance_with_report(
    mu: &[Rate],
    cov: &[Vec<Decimal>],
    constraints: &ConstraintSet,
    bounds: &BoundSet,
    initial_guess: Option<&[Weight]>,
    settings: &SolverSettings,
) -> MarkowitzResult<SolveReport> {
    let n = mu.len();
    validate_problem(n, cov, constraints, bounds, initial_guess)?;

    let x0_dec = match initial_guess {
        Some(guess) => guess.to_vec(),
        None => equal_weights(n),
    };
    let x0 = to_f64_vec(&x0_dec, "initial_guess")?;
    let sigma = cov
        .iter()
        .map(|row| to_f64_vec(row, "covariance_matrix"))
        .collect::<MarkowitzResult<Vec<Vec<f64>>>>()?;

    tracing::debug!(
        start_variance = %quadratic_form(cov, &x0_dec),
        "starting minimum-variance solve"
    );

    let qp = QuadraticProgram::assemble(&sigma, &x0, constraints, bounds)?;

    let mut builder = DefaultSettingsBuilder::default();
    builder
        .verbose(settings.verbose)
        .max_iter(settings.max_iter)
        .time_limit(settings.time_limit_secs.unwrap_or(f64::INFINITY))
        .tol_gap_abs(settings.tol_gap_abs)
        .tol_gap_rel(settings.tol_gap_rel)
        .tol_feas(settings.tol_feas);
    let clarabel_settings = builder.build().map_err(|e| MarkowitzError::InvalidInput {
        field: "solver_settings".into(),
        reason: e.to_string(),
    })?;

    let mut solver = DefaultSolver::new(
        &qp.p,
        &qp.q,
        &qp.a,
        &qp.b,
        &qp.cones,
        clarabel_settings,
    )
    .map_err(|e| MarkowitzError::NumericalError(format!("Failed to create solver: {:?}", e)))?;
    solver.solve();

    let status = solver.solution.status;
    let iterations = solver.solution.iterations;
    let solve_time_secs = solver.solution.solve_time;

    if !matches!(status, SolverStatus::Solved) {
        let status = format!("{:?}", status);
        tracing::warn!(%status, iterations, "minimum-variance solve did not converge");
        return Err(MarkowitzError::InfeasibleConstraints { status });
    }

    let weights = x0
        .iter()
        .zip(solver.solution.x.iter())
        .map(|(start, step)| {
            Decimal::from_f64(start + step).ok_or_else(|| {
                MarkowitzError::NumericalError(format!(
                    "Solver returned a non-finite weight ({})",
                    start + step
                ))
            })
        })
        .collect::<MarkowitzResult<Vec<Weight>>>()?;

    check_feasible(&weights, constraints, bounds)?;

    let variance = quadratic_form(cov, &weights);
    tracing::debug!(iterations, solve_time_secs, %variance, "minimum-variance solve converged");

    Ok(SolveReport {
        weights,
        status: format!("{:?}", status),
        iterations,
        solve_time_secs,
        variance,
    })
}

// ---------------------------------------------------------------------------
// Problem assembly
// ---------------------------------------------------------------------------

struct QuadraticProgram {
    p: CscMatrix<f64>,
    q: Vec<f64>,
    a: CscMatrix<f64>,
    b: Vec<f64>,
    cones: Vec<SupportedConeT<f64>>,
}

impl QuadraticProgram {
    fn assemble(
        sigma: &[Vec<f64>],
        x0: &[f64],
        constraints: &ConstraintSet,
        bounds: &BoundSet,
    ) -> MarkowitzResult<Self> {
        let n = x0.len();

        // P = Sigma + Sigma' (= 2 Sigma for a symmetric matrix)
        let p_full: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| sigma[i][j] + sigma[j][i]).collect())
            .collect();
        let q: Vec<f64> = p_full
            .iter()
            .map(|row| row.iter().zip(x0.iter()).map(|(p, x)| p * x).sum())
            .collect();
        let p = upper_triangle_csc(&p_full);

        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut b: Vec<f64> = Vec::new();

        let mut n_zero = 0usize;
        for c in constraints.equalities() {
            let a = to_f64_vec(&c.coefficients, &c.name)?;
            let constant = to_f64(c.constant, &c.name)?;
            b.push(constant - dot(&a, x0));
            rows.push(a);
            n_zero += 1;
        }

        let mut n_nonneg = 0usize;
        for c in constraints.inequalities() {
            let a = to_f64_vec(&c.coefficients, &c.name)?;
            let constant = to_f64(c.constant, &c.name)?;
            b.push(dot(&a, x0) - constant);
            rows.push(a.iter().map(|v| -v).collect());
            n_nonneg += 1;
        }

        if let BoundSet::PerAsset { bounds } = bounds {
            for (i, bound) in bounds.iter().enumerate() {
                let lower = to_f64(bound.lower, "bounds.lower")?;
                rows.push(unit_row(n, i, -1.0));
                b.push(x0[i] - lower);
            }
            for (i, bound) in bounds.iter().enumerate() {
                let upper = to_f64(bound.upper, "bounds.upper")?;
                rows.push(unit_row(n, i, 1.0));
                b.push(upper - x0[i]);
            }
            n_nonneg += 2 * bounds.len();
        }

        let mut cones = Vec::new();
        if n_zero > 0 {
            cones.push(SupportedConeT::ZeroConeT(n_zero));
        }
        if n_nonneg > 0 {
            cones.push(SupportedConeT::NonnegativeConeT(n_nonneg));
        }

        tracing::debug!(
            n_vars = n,
            n_zero,
            n_nonneg,
            "assembled quadratic program"
        );

        Ok(QuadraticProgram {
            p,
            q,
            a: dense_rows_to_csc(&rows, n),
            b,
            cones,
        })
    }
}

/// Upper triangle of a square matrix in CSC form, as Clarabel expects for `P`.
fn upper_triangle_csc(m: &[Vec<f64>]) -> CscMatrix<f64> {
    let n = m.len();
    let mut colptr = Vec::with_capacity(n + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for j in 0..n {
        for (i, row) in m.iter().enumerate().take(j + 1) {
            let v = row[j];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr.push(nzval.len());
    }
    CscMatrix::new(n, n, colptr, rowval, nzval)
}

/// Dense row-major matrix to CSC, dropping exact zeros.
fn dense_rows_to_csc(rows: &[Vec<f64>], ncols: usize) -> CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(ncols + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for j in 0..ncols {
        for (i, row) in rows.iter().enumerate() {
            let v = row[j];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr.push(nzval.len());
    }
    CscMatrix::new(rows.len(), ncols, colptr, rowval, nzval)
}

fn unit_row(n: usize, i: usize, value: f64) -> Vec<f64> {
    let mut row = vec![0.0; n];
    row[i] = value;
    row
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_problem(
    n: usize,
    cov: &[Vec<Decimal>],
    constraints: &ConstraintSet,
    bounds: &BoundSet,
    initial_guess: Option<&[Weight]>,
) -> MarkowitzResult<()> {
    if n == 0 {
        return Err(MarkowitzError::EmptyUniverse);
    }

    if cov.len() != n || cov.iter().any(|row| row.len() != n) {
        return Err(MarkowitzError::InvalidInput {
            field: "covariance_matrix".into(),
            reason: format!("Expected a {}x{} matrix", n, n),
        });
    }

    for c in constraints.iter() {
        if c.coefficients.len() != n {
            return Err(MarkowitzError::InvalidInput {
                field: format!("constraints.{}", c.name),
                reason: format!(
                    "Expected {} coefficients but got {}",
                    n,
                    c.coefficients.len()
                ),
            });
        }
    }

    if let BoundSet::PerAsset { bounds } = bounds {
        if bounds.len() != n {
            return Err(MarkowitzError::InvalidInput {
                field: "bounds".into(),
                reason: format!("Expected {} bound pairs but got {}", n, bounds.len()),
            });
        }
    }

    if let Some(guess) = initial_guess {
        if guess.len() != n {
            return Err(MarkowitzError::InvalidInput {
                field: "initial_guess".into(),
                reason: format!("Expected {} weights but got {}", n, guess.len()),
            });
        }
    }

    Ok(())
}

/// Reject a "converged" answer that does not actually satisfy the problem.
fn check_feasible(
    weights: &[Weight],
    constraints: &ConstraintSet,
    bounds: &BoundSet,
) -> MarkowitzResult<()> {
    if let Some((c, amount)) = constraints.worst_violation(weights) {
        if amount > FEASIBILITY_TOLERANCE {
            let kind = match c.kind {
                ConstraintKind::Equality => "equality",
                ConstraintKind::Inequality => "inequality",
            };
            return Err(MarkowitzError::InfeasibleConstraints {
                status: format!(
                    "Solved with {} constraint '{}' violated by {}",
                    kind, c.name, amount
                ),
            });
        }
    }

    if let Some((i, amount)) = bounds.worst_violation(weights) {
        if amount > FEASIBILITY_TOLERANCE {
            return Err(MarkowitzError::InfeasibleConstraints {
                status: format!("Solved with bounds of asset {} violated by {}", i, amount),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Decimal <-> f64
// ---------------------------------------------------------------------------

fn to_f64(value: Decimal, field: &str) -> MarkowitzResult<f64> {
    value.to_f64().ok_or_else(|| {
        MarkowitzError::NumericalError(format!("{}: {} is not representable as f64", field, value))
    })
}

fn to_f64_vec(values: &[Decimal], field: &str) -> MarkowitzResult<Vec<f64>> {
    values.iter().map(|v| to_f64(*v, field)).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
