//! Lagrange finite elements and their tabulation.
//!
//! Tables use the layout `[derivative][point][dof]`, derivatives ordered
//! value, `d/dx`, `d/dy`, `d/dz`. Dofs follow [`ElementDofLayout`]: vertices
//! first, then edges in reference order.

use crate::geometry::element::{CoordinateElement, ElementDofLayout};
use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;
use serde::{Deserialize, Serialize};

/// Basis values and derivatives at a set of points.
#[derive(Clone, Debug, PartialEq)]
pub struct Tabulation {
    /// Flattened `[derivative][point][dof]` values.
    pub data: Vec<f64>,
    /// `(num_derivatives, num_points, num_dofs)`.
    pub shape: [usize; 3],
}

impl Tabulation {
    #[inline]
    pub fn get(&self, deriv: usize, point: usize, dof: usize) -> f64 {
        let [_, np, nd] = self.shape;
        self.data[(deriv * np + point) * nd + dof]
    }

    /// Values (or one derivative) of every dof at `point`.
    #[inline]
    pub fn row(&self, deriv: usize, point: usize) -> &[f64] {
        let [_, np, nd] = self.shape;
        let start = (deriv * np + point) * nd;
        &self.data[start..start + nd]
    }
}

/// Scalar Lagrange element on a reference cell.
///
/// Supported: degree 1 on every cell but the prism (P1 on simplices, Q1 on
/// quadrilaterals and hexahedra) and degree 2 on triangles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FiniteElement {
    cell_type: CellType,
    degree: usize,
}

impl FiniteElement {
    pub fn new(cell_type: CellType, degree: usize) -> Result<Self, MeshError> {
        let ok = match (cell_type, degree) {
            (CellType::Point | CellType::Prism, _) => false,
            (_, 1) => true,
            (CellType::Triangle, 2) => true,
            _ => false,
        };
        if !ok {
            return Err(MeshError::UnsupportedElement(format!(
                "Lagrange degree {degree} on {cell_type:?}"
            )));
        }
        Ok(Self { cell_type, degree })
    }

    /// The element a coordinate map uses to interpolate geometry.
    pub fn from_coordinate_element(cmap: &CoordinateElement) -> Result<Self, MeshError> {
        Self::new(cmap.cell_shape(), cmap.degree())
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn dim(&self) -> usize {
        self.dof_layout().num_dofs()
    }

    pub fn dof_layout(&self) -> ElementDofLayout {
        ElementDofLayout::lagrange(self.cell_type, self.degree)
    }

    /// Stable identifier of the element, independent of process and build.
    pub fn hash(&self) -> u64 {
        // FNV-1a
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let code = self.cell_type.dimension() * 16 + self.cell_type.num_vertices();
        for b in b"lagrange"
            .iter()
            .copied()
            .chain((code as u64).to_le_bytes())
            .chain((self.degree as u64).to_le_bytes())
        {
            h ^= u64::from(b);
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
        h
    }

    /// Reference coordinates of the dof points, `tdim` values per dof.
    pub fn points(&self) -> Vec<f64> {
        let tdim = self.cell_type.dimension();
        let mut pts: Vec<f64> = self
            .cell_type
            .reference_vertices()
            .iter()
            .flat_map(|v| v[..tdim].iter().copied())
            .collect();
        if self.degree == 2 {
            let verts = self.cell_type.reference_vertices();
            for e in self.cell_type.sub_entities(1) {
                pts.extend((0..tdim).map(|k| 0.5 * (verts[e[0]][k] + verts[e[1]][k])));
            }
        }
        pts
    }

    /// Tabulate derivatives up to order `nd` (0 or 1) at `points`
    /// (`tdim` values per point).
    pub fn tabulate(&self, nd: usize, points: &[f64]) -> Result<Tabulation, MeshError> {
        let tdim = self.cell_type.dimension();
        if nd > 1 {
            return Err(MeshError::UnsupportedElement(format!(
                "derivatives of order {nd} of {self:?}"
            )));
        }
        if points.len() % tdim != 0 {
            return Err(MeshError::ValueLength {
                what: "tabulation points",
                expected: points.len().next_multiple_of(tdim),
                found: points.len(),
            });
        }
        let np = points.len() / tdim;
        let ndofs = self.dim();
        let nderiv = if nd == 0 { 1 } else { 1 + tdim };
        let mut data = vec![0.0; nderiv * np * ndofs];
        let mut vals = vec![0.0; ndofs];
        let mut grads = vec![0.0; ndofs * tdim];
        for (p, x) in points.chunks_exact(tdim).enumerate() {
            self.eval(x, &mut vals, &mut grads);
            data[p * ndofs..(p + 1) * ndofs].copy_from_slice(&vals);
            for d in 1..nderiv {
                let row = &mut data[(d * np + p) * ndofs..(d * np + p + 1) * ndofs];
                for (i, r) in row.iter_mut().enumerate() {
                    *r = grads[i * tdim + d - 1];
                }
            }
        }
        Ok(Tabulation {
            data,
            shape: [nderiv, np, ndofs],
        })
    }

    fn eval(&self, x: &[f64], vals: &mut [f64], grads: &mut [f64]) {
        let tdim = x.len();
        match self.cell_type {
            CellType::Quadrilateral | CellType::Hexahedron => {
                // vertex i sits at bit k of i along axis k
                for (i, v) in vals.iter_mut().enumerate() {
                    let f = |k: usize| if (i >> k) & 1 == 1 { x[k] } else { 1.0 - x[k] };
                    let df = |k: usize| if (i >> k) & 1 == 1 { 1.0 } else { -1.0 };
                    *v = (0..tdim).map(f).product();
                    for k in 0..tdim {
                        grads[i * tdim + k] =
                            (0..tdim).map(|j| if j == k { df(j) } else { f(j) }).product();
                    }
                }
            }
            _ => {
                // barycentric coordinates and their constant gradients
                let mut lam = [0.0; 4];
                lam[0] = 1.0 - x.iter().sum::<f64>();
                lam[1..=tdim].copy_from_slice(x);
                let dlam = |a: usize, k: usize| -> f64 {
                    if a == 0 {
                        -1.0
                    } else if a == k + 1 {
                        1.0
                    } else {
                        0.0
                    }
                };
                let nv = tdim + 1;
                if self.degree == 1 {
                    for a in 0..nv {
                        vals[a] = lam[a];
                        for k in 0..tdim {
                            grads[a * tdim + k] = dlam(a, k);
                        }
                    }
                } else {
                    for a in 0..nv {
                        vals[a] = lam[a] * (2.0 * lam[a] - 1.0);
                        for k in 0..tdim {
                            grads[a * tdim + k] = (4.0 * lam[a] - 1.0) * dlam(a, k);
                        }
                    }
                    for (e, ev) in self.cell_type.sub_entities(1).enumerate() {
                        let (a, b) = (ev[0], ev[1]);
                        vals[nv + e] = 4.0 * lam[a] * lam[b];
                        for k in 0..tdim {
                            grads[(nv + e) * tdim + k] =
                                4.0 * (dlam(a, k) * lam[b] + lam[a] * dlam(b, k));
                        }
                    }
                }
            }
        }
    }
}
