//! Built-in kernels for Lagrange spaces.
//!
//! These stand in for generated code: each kernel embeds a reference rule
//! and its basis tables for the compiled path, and evaluates the same
//! integrand from caller-supplied data on the runtime path.

use crate::fem::element::{FiniteElement, Tabulation};
use crate::fem::kernel::{EvaluationKind, EvaluationMode, RuntimeQuadrature, TabulateTensor};
use crate::mesh_error::MeshError;
use crate::quadrature::reference::make_quadrature;

/// Integrand of a [`LagrangeKernel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelKind {
    /// `∫ α dx`, rank 0.
    Constant,
    /// `∫ α f dx`, rank 0, one coefficient.
    Coefficient,
    /// `∫ α v dx`, rank 1.
    Load,
    /// `∫ u v dx`, rank 2.
    Mass,
    /// `∫_Γ α ds`, rank 0, runtime only.
    Interface,
}

#[derive(Debug)]
struct CompiledRule {
    points: Vec<f64>,
    weights: Vec<f64>,
    tables: Vec<Tabulation>,
}

/// Kernel for one of the [`KernelKind`] integrands.
#[derive(Debug)]
pub struct LagrangeKernel {
    kind: KernelKind,
    element_dim: usize,
    hashes: Vec<u64>,
    deriv_orders: Vec<usize>,
    compiled: Option<CompiledRule>,
}

impl LagrangeKernel {
    fn build(
        kind: KernelKind,
        cmap: FiniteElement,
        element: Option<FiniteElement>,
        quadrature_degree: Option<usize>,
    ) -> Result<Self, MeshError> {
        let mut slots = vec![(cmap, 1)];
        let n_element_slots = match kind {
            KernelKind::Constant | KernelKind::Interface => 0,
            KernelKind::Coefficient | KernelKind::Load => 1,
            KernelKind::Mass => 2,
        };
        if let Some(el) = element {
            if el.cell_type() != cmap.cell_type() {
                return Err(MeshError::MixedCellTypes {
                    first: cmap.cell_type(),
                    other: el.cell_type(),
                });
            }
            slots.extend(std::iter::repeat_n((el, 0), n_element_slots));
        }
        let compiled = match quadrature_degree {
            Some(q) => {
                let rule = make_quadrature(cmap.cell_type(), q)?;
                let tables = slots
                    .iter()
                    .map(|(el, nd)| el.tabulate(*nd, &rule.points))
                    .collect::<Result<_, _>>()?;
                Some(CompiledRule {
                    points: rule.points,
                    weights: rule.weights,
                    tables,
                })
            }
            None => None,
        };
        Ok(Self {
            kind,
            element_dim: element.map_or(1, |e| e.dim()),
            hashes: slots.iter().map(|(el, _)| el.hash()).collect(),
            deriv_orders: slots.iter().map(|(_, nd)| *nd).collect(),
            compiled,
        })
    }

    /// `∫ α dx` with a built-in rule of degree `quadrature_degree`.
    pub fn constant_functional(cmap: FiniteElement, quadrature_degree: usize) -> Result<Self, MeshError> {
        Self::build(KernelKind::Constant, cmap, None, Some(quadrature_degree))
    }

    /// `∫ α f dx` for a coefficient `f` in `element`.
    pub fn coefficient_functional(
        cmap: FiniteElement,
        element: FiniteElement,
        quadrature_degree: usize,
    ) -> Result<Self, MeshError> {
        Self::build(KernelKind::Coefficient, cmap, Some(element), Some(quadrature_degree))
    }

    /// `∫ α v dx` for test functions in `element`.
    pub fn load_vector(
        cmap: FiniteElement,
        element: FiniteElement,
        quadrature_degree: usize,
    ) -> Result<Self, MeshError> {
        Self::build(KernelKind::Load, cmap, Some(element), Some(quadrature_degree))
    }

    /// `∫ u v dx` with test and trial functions in `element`.
    pub fn mass_matrix(
        cmap: FiniteElement,
        element: FiniteElement,
        quadrature_degree: usize,
    ) -> Result<Self, MeshError> {
        Self::build(KernelKind::Mass, cmap, Some(element), Some(quadrature_degree))
    }

    /// `∫_Γ α ds` over interface rules; has no compiled path.
    pub fn interface_functional(cmap: FiniteElement) -> Result<Self, MeshError> {
        Self::build(KernelKind::Interface, cmap, None, None)
    }

    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Entries of the element tensor.
    pub fn tensor_size(&self) -> usize {
        match self.kind {
            KernelKind::Load => self.element_dim,
            KernelKind::Mass => self.element_dim * self.element_dim,
            _ => 1,
        }
    }

    /// Points and weights of the compiled rule.
    pub fn compiled_rule(&self) -> Option<(&[f64], &[f64])> {
        self.compiled
            .as_ref()
            .map(|r| (r.points.as_slice(), r.weights.as_slice()))
    }

    fn evaluate(
        &self,
        a: &mut [f64],
        w: &[f64],
        c: &[f64],
        x: &[f64],
        weights: &[f64],
        normals: &[f64],
        tables: &[&Tabulation],
    ) -> Result<(), MeshError> {
        let cm = tables[0];
        let [nderiv, np, ncdofs] = cm.shape;
        let tdim = nderiv - 1;
        if np != weights.len() {
            return Err(MeshError::ValueLength {
                what: "quadrature weights",
                expected: np,
                found: weights.len(),
            });
        }
        if x.len() != 3 * ncdofs {
            return Err(MeshError::ValueLength {
                what: "coordinate dofs",
                expected: 3 * ncdofs,
                found: x.len(),
            });
        }
        let alpha = match self.kind {
            KernelKind::Mass => 1.0,
            _ => *c.first().ok_or_else(|| MeshError::MissingFormInput("alpha".into()))?,
        };
        for q in 0..np {
            // J = sum_n x_n (grad phi_n)^T, stored by columns
            let mut jac = [[0.0; 3]; 3];
            for (k, col) in jac.iter_mut().enumerate().take(tdim) {
                for (n, &d) in cm.row(k + 1, q).iter().enumerate() {
                    for i in 0..3 {
                        col[i] += x[3 * n + i] * d;
                    }
                }
            }
            let g = gram(&jac, tdim);
            let det_g = det(&g, tdim);
            if det_g <= 0.0 {
                return Err(MeshError::DegenerateGeometry(format!(
                    "singular Jacobian at point {q}"
                )));
            }
            let dx = weights[q] * det_g.sqrt();
            match self.kind {
                KernelKind::Constant => a[0] += alpha * dx,
                KernelKind::Coefficient => {
                    let f: f64 = tables[1].row(0, q).iter().zip(w).map(|(p, wi)| p * wi).sum();
                    a[0] += alpha * f * dx;
                }
                KernelKind::Load => {
                    for (ai, p) in a.iter_mut().zip(tables[1].row(0, q)) {
                        *ai += alpha * p * dx;
                    }
                }
                KernelKind::Mass => {
                    let v = tables[1].row(0, q);
                    let u = tables[2].row(0, q);
                    let n = u.len();
                    for (i, vi) in v.iter().enumerate() {
                        for (j, uj) in u.iter().enumerate() {
                            a[i * n + j] += vi * uj * dx;
                        }
                    }
                }
                KernelKind::Interface => {
                    let nref = normals.get(q * tdim..(q + 1) * tdim).ok_or(MeshError::ValueLength {
                        what: "interface normals",
                        expected: np * tdim,
                        found: normals.len(),
                    })?;
                    // Nanson: ds = sqrt(det G) sqrt(N^T G^-1 N) dS
                    let scale = inverse_quadratic(&g, tdim, nref) / det_g;
                    a[0] += alpha * dx * scale.max(0.0).sqrt();
                }
            }
        }
        Ok(())
    }
}

fn gram(jac: &[[f64; 3]; 3], tdim: usize) -> [[f64; 3]; 3] {
    let mut g = [[0.0; 3]; 3];
    for i in 0..tdim {
        for j in 0..tdim {
            g[i][j] = (0..3).map(|k| jac[i][k] * jac[j][k]).sum();
        }
    }
    g
}

fn det(g: &[[f64; 3]; 3], n: usize) -> f64 {
    match n {
        0 => 1.0,
        1 => g[0][0],
        2 => g[0][0] * g[1][1] - g[0][1] * g[1][0],
        _ => {
            g[0][0] * (g[1][1] * g[2][2] - g[1][2] * g[2][1])
                - g[0][1] * (g[1][0] * g[2][2] - g[1][2] * g[2][0])
                + g[0][2] * (g[1][0] * g[2][1] - g[1][1] * g[2][0])
        }
    }
}

/// `det(G) * N^T G^-1 N` through the adjugate of the symmetric `G`.
fn inverse_quadratic(g: &[[f64; 3]; 3], n: usize, v: &[f64]) -> f64 {
    let mut adj = [[0.0; 3]; 3];
    match n {
        1 => adj[0][0] = 1.0,
        2 => {
            adj[0][0] = g[1][1];
            adj[1][1] = g[0][0];
            adj[0][1] = -g[0][1];
            adj[1][0] = -g[1][0];
        }
        3 => {
            for i in 0..3 {
                for j in 0..3 {
                    let (r0, r1) = ((j + 1) % 3, (j + 2) % 3);
                    let (c0, c1) = ((i + 1) % 3, (i + 2) % 3);
                    adj[i][j] = g[r0][c0] * g[r1][c1] - g[r0][c1] * g[r1][c0];
                }
            }
        }
        _ => return 0.0,
    }
    let mut s = 0.0;
    for i in 0..n {
        for j in 0..n {
            s += v[i] * adj[i][j] * v[j];
        }
    }
    s
}

impl TabulateTensor for LagrangeKernel {
    fn name(&self) -> &'static str {
        match self.kind {
            KernelKind::Constant => "constant_functional",
            KernelKind::Coefficient => "coefficient_functional",
            KernelKind::Load => "load_vector",
            KernelKind::Mass => "mass_matrix",
            KernelKind::Interface => "interface_functional",
        }
    }

    fn finite_element_hashes(&self) -> &[u64] {
        &self.hashes
    }

    fn finite_element_deriv_orders(&self) -> &[usize] {
        &self.deriv_orders
    }

    fn supports(&self, kind: EvaluationKind) -> bool {
        match kind {
            EvaluationKind::Compiled => self.compiled.is_some(),
            EvaluationKind::Runtime => true,
        }
    }

    fn tabulate_tensor(
        &self,
        a: &mut [f64],
        w: &[f64],
        c: &[f64],
        coordinate_dofs: &[f64],
        mode: &EvaluationMode<'_>,
    ) -> Result<(), MeshError> {
        if a.len() != self.tensor_size() {
            return Err(MeshError::ValueLength {
                what: "element tensor",
                expected: self.tensor_size(),
                found: a.len(),
            });
        }
        match mode {
            EvaluationMode::Compiled => {
                let rule = self.compiled.as_ref().ok_or(MeshError::UnsupportedEvaluation {
                    kernel: self.name(),
                    mode: EvaluationKind::Compiled.as_str(),
                })?;
                let tables: Vec<&Tabulation> = rule.tables.iter().collect();
                self.evaluate(a, w, c, coordinate_dofs, &rule.weights, &[], &tables)
            }
            EvaluationMode::Runtime(RuntimeQuadrature {
                weights,
                normals,
                tables,
                ..
            }) => {
                if tables.len() != self.hashes.len() {
                    return Err(MeshError::ValueLength {
                        what: "runtime basis tables",
                        expected: self.hashes.len(),
                        found: tables.len(),
                    });
                }
                if self.kind == KernelKind::Interface && normals.is_empty() {
                    return Err(MeshError::UnsupportedEvaluation {
                        kernel: self.name(),
                        mode: "volume-rule",
                    });
                }
                self.evaluate(a, w, c, coordinate_dofs, weights, normals, tables)
            }
        }
    }
}
