//! Element tensor kernel contract.
//!
//! A kernel computes the element tensor of one cell. It runs either with
//! the quadrature it was built with ([`EvaluationMode::Compiled`]) or with
//! points, weights, normals and basis tables supplied by the caller
//! ([`EvaluationMode::Runtime`]). Both modes share one signature.

use crate::fem::element::Tabulation;
use crate::mesh_error::MeshError;
use std::fmt;

/// Which evaluation path of a kernel is requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvaluationKind {
    Compiled,
    Runtime,
}

impl EvaluationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationKind::Compiled => "compiled",
            EvaluationKind::Runtime => "runtime",
        }
    }
}

/// Quadrature data handed to a kernel at run time.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeQuadrature<'a> {
    /// Flattened `(num_points, tdim)` reference points.
    pub points: &'a [f64],
    pub weights: &'a [f64],
    /// Reference unit normals per point; empty for volume rules.
    pub normals: &'a [f64],
    /// One table per element slot of the kernel, tabulated at `points` up to
    /// the slot's derivative order.
    pub tables: &'a [&'a Tabulation],
}

impl RuntimeQuadrature<'_> {
    pub fn num_points(&self) -> usize {
        self.weights.len()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum EvaluationMode<'a> {
    /// Use the kernel's own quadrature and tables.
    Compiled,
    /// Use caller-provided quadrature and tables.
    Runtime(RuntimeQuadrature<'a>),
}

impl EvaluationMode<'_> {
    pub fn kind(&self) -> EvaluationKind {
        match self {
            EvaluationMode::Compiled => EvaluationKind::Compiled,
            EvaluationMode::Runtime(_) => EvaluationKind::Runtime,
        }
    }
}

/// Element tensor kernel.
///
/// Element slot 0 is the coordinate element; the remaining slots are the
/// argument elements (test, then trial) followed by the coefficient
/// elements. The assembler checks [`finite_element_hashes`] against the
/// elements of the form before the first cell.
///
/// [`finite_element_hashes`]: TabulateTensor::finite_element_hashes
pub trait TabulateTensor: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Hash of the element expected in every slot.
    fn finite_element_hashes(&self) -> &[u64];

    /// Highest derivative needed from every slot.
    fn finite_element_deriv_orders(&self) -> &[usize];

    fn supports(&self, kind: EvaluationKind) -> bool;

    /// Add the element tensor of one cell to `a`.
    ///
    /// * `w` - coefficient dofs of the cell, coefficient by coefficient.
    /// * `c` - constants, in the order of the form's constant names.
    /// * `coordinate_dofs` - three values per geometry node.
    fn tabulate_tensor(
        &self,
        a: &mut [f64],
        w: &[f64],
        c: &[f64],
        coordinate_dofs: &[f64],
        mode: &EvaluationMode<'_>,
    ) -> Result<(), MeshError>;
}
