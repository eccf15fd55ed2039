//! Quadrature rules: reference rules and runtime rules on cut cells.

pub mod generation;
pub mod reference;

pub use generation::{
    fragment_quadrature, physical_points, runtime_quadrature, runtime_quadrature_with,
};
pub use reference::{gauss_legendre, make_quadrature};

use std::collections::BTreeMap;

/// Points and weights in the reference coordinates of one cell.
///
/// Interface rules also carry a unit normal per point (reference
/// coordinates, pointing towards `phi > 0`); volume rules leave `normals`
/// empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuadratureRule {
    /// Components per point.
    pub tdim: usize,
    /// Flattened `(num_points, tdim)` points.
    pub points: Vec<f64>,
    pub weights: Vec<f64>,
    /// Flattened `(num_points, tdim)` normals, or empty.
    pub normals: Vec<f64>,
}

impl QuadratureRule {
    pub fn new(tdim: usize, points: Vec<f64>, weights: Vec<f64>) -> Self {
        Self {
            tdim,
            points,
            weights,
            normals: Vec::new(),
        }
    }

    #[inline]
    pub fn num_points(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    #[inline]
    pub fn point(&self, i: usize) -> &[f64] {
        &self.points[i * self.tdim..(i + 1) * self.tdim]
    }

    /// Append the points of `other` (same `tdim`).
    pub fn append(&mut self, other: QuadratureRule) {
        self.points.extend(other.points);
        self.weights.extend(other.weights);
        self.normals.extend(other.normals);
    }
}

/// Runtime rules keyed by local cell index, iterated in ascending order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuadratureRules {
    rules: BTreeMap<usize, QuadratureRule>,
}

impl QuadratureRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `rule` for `cell`, merging with a rule already present.
    pub fn insert(&mut self, cell: usize, rule: QuadratureRule) {
        match self.rules.get_mut(&cell) {
            Some(existing) => existing.append(rule),
            None => {
                self.rules.insert(cell, rule);
            }
        }
    }

    pub fn get(&self, cell: usize) -> Option<&QuadratureRule> {
        self.rules.get(&cell)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &QuadratureRule)> + '_ {
        self.rules.iter().map(|(&c, r)| (c, r))
    }

    pub fn cells(&self) -> Vec<usize> {
        self.rules.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
