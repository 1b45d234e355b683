//! Constraint and bound values for the minimum-variance problem.
//!
//! Every constraint is linear in the weights, so each one is stored as its
//! coefficient row plus a constant and evaluated as `dot(coefficients, w) - constant`.
//! Equalities must evaluate to zero, inequalities to a non-negative value.
//! The same values drive the solver's constraint matrix and the post-solve
//! feasibility check.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::vec_dot;
use crate::types::{Rate, Weight};
use crate::universe::{AssetCategory, Universe};

/// Largest constraint or bound violation accepted in a returned allocation.
pub const FEASIBILITY_TOLERANCE: Decimal = dec!(0.000001);

pub const BUDGET: &str = "budget";
pub const TARGET_RETURN: &str = "target_return";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// `g(w) == 0`
    Equality,
    /// `g(w) >= 0`
    Inequality,
}

/// A named linear constraint `g(w) = dot(coefficients, w) - constant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearConstraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub coefficients: Vec<Decimal>,
    pub constant: Decimal,
}

impl LinearConstraint {
    pub fn equality(name: impl Into<String>, coefficients: Vec<Decimal>, constant: Decimal) -> Self {
        LinearConstraint {
            name: name.into(),
            kind: ConstraintKind::Equality,
            coefficients,
            constant,
        }
    }

    pub fn inequality(
        name: impl Into<String>,
        coefficients: Vec<Decimal>,
        constant: Decimal,
    ) -> Self {
        LinearConstraint {
            name: name.into(),
            kind: ConstraintKind::Inequality,
            coefficients,
            constant,
        }
    }

    pub fn evaluate(&self, weights: &[Weight]) -> Decimal {
        vec_dot(&self.coefficients, weights) - self.constant
    }

    /// Distance from satisfying the constraint; zero when satisfied.
    pub fn violation(&self, weights: &[Weight]) -> Decimal {
        let g = self.evaluate(weights);
        match self.kind {
            ConstraintKind::Equality => g.abs(),
            ConstraintKind::Inequality => (-g).max(Decimal::ZERO),
        }
    }

    pub fn is_satisfied(&self, weights: &[Weight], tolerance: Decimal) -> bool {
        self.violation(weights) <= tolerance
    }
}

/// Ordered collection of constraints. Equalities are always listed first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSet {
    constraints: Vec<LinearConstraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: LinearConstraint) {
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinearConstraint> {
        self.constraints.iter()
    }

    pub fn get(&self, name: &str) -> Option<&LinearConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn equalities(&self) -> impl Iterator<Item = &LinearConstraint> {
        self.of_kind(ConstraintKind::Equality)
    }

    pub fn inequalities(&self) -> impl Iterator<Item = &LinearConstraint> {
        self.of_kind(ConstraintKind::Inequality)
    }

    fn of_kind(&self, kind: ConstraintKind) -> impl Iterator<Item = &LinearConstraint> {
        self.constraints.iter().filter(move |c| c.kind == kind)
    }

    /// The most violated constraint and its violation, if any constraint exists.
    pub fn worst_violation(&self, weights: &[Weight]) -> Option<(&LinearConstraint, Decimal)> {
        self.constraints
            .iter()
            .map(|c| (c, c.violation(weights)))
            .max_by(|a, b| a.1.cmp(&b.1))
    }
}

/// Inclusive weight range for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBounds {
    pub lower: Weight,
    pub upper: Weight,
}

/// Box constraints on individual weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundSet {
    /// Short selling allowed: weights are unconstrained in sign and size.
    Unbounded,
    PerAsset { bounds: Vec<AssetBounds> },
}

impl BoundSet {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, BoundSet::Unbounded)
    }

    /// Index of the asset furthest outside its bounds, with the distance.
    pub fn worst_violation(&self, weights: &[Weight]) -> Option<(usize, Decimal)> {
        match self {
            BoundSet::Unbounded => None,
            BoundSet::PerAsset { bounds } => bounds
                .iter()
                .zip(weights.iter())
                .enumerate()
                .map(|(i, (b, w))| {
                    let below = (b.lower - *w).max(Decimal::ZERO);
                    let above = (*w - b.upper).max(Decimal::ZERO);
                    (i, below.max(above))
                })
                .max_by(|a, b| a.1.cmp(&b.1)),
        }
    }
}

/// Per-asset allocation knobs shared by every asset in the universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLimits {
    pub allow_short: bool,
    pub min_asset_weight: Weight,
    pub max_weight: Weight,
}

impl Default for AllocationLimits {
    fn default() -> Self {
        AllocationLimits {
            allow_short: false,
            min_asset_weight: Decimal::ZERO,
            max_weight: Decimal::ONE,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// 0/1 mask over the universe marking assets of `category`.
pub fn category_indicator(universe: &Universe, category: &AssetCategory) -> Vec<Decimal> {
    universe
        .assets()
        .iter()
        .map(|a| {
            if a.category.same_tag(category) {
                Decimal::ONE
            } else {
                Decimal::ZERO
            }
        })
        .collect()
}

pub fn category_constraint_name(category: &AssetCategory) -> String {
    format!("category_minimum:{}", category)
}

/// Build the constraint and bound sets for one optimization run.
///
/// Emits the budget and target-return equalities, then one floor per category
/// with a positive threshold that is present in the universe. Categories are
/// visited in map order, so the output is deterministic. No feasibility
/// checking happens here.
pub fn build_constraints(
    universe: &Universe,
    mu: &[Rate],
    target_return: Rate,
    category_minimums: &BTreeMap<AssetCategory, Weight>,
    limits: &AllocationLimits,
) -> (ConstraintSet, BoundSet) {
    let n = universe.len();
    let mut set = ConstraintSet::new();

    set.push(LinearConstraint::equality(
        BUDGET,
        vec![Decimal::ONE; n],
        Decimal::ONE,
    ));
    set.push(LinearConstraint::equality(
        TARGET_RETURN,
        mu.to_vec(),
        target_return,
    ));

    for (category, threshold) in category_minimums {
        if *threshold <= Decimal::ZERO || !universe.contains_category(category) {
            continue;
        }
        set.push(LinearConstraint::inequality(
            category_constraint_name(category),
            category_indicator(universe, category),
            *threshold,
        ));
    }

    let bounds = if limits.allow_short {
        BoundSet::Unbounded
    } else {
        BoundSet::PerAsset {
            bounds: vec![
                AssetBounds {
                    lower: limits.min_asset_weight,
                    upper: limits.max_weight,
                };
                n
            ],
        }
    };

    tracing::debug!(
        n_assets = n,
        n_constraints = set.len(),
        unbounded = bounds.is_unbounded(),
        "built minimum-variance constraints"
    );

    (set, bounds)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
