//! Scalar function spaces and finite element functions on a [`Mesh`].

use crate::algs::communicator::Communicator;
use crate::fem::element::FiniteElement;
use crate::mesh::Mesh;
use crate::mesh_error::MeshError;
use crate::topology::adjacency::AdjacencyList;
use std::sync::Arc;

/// A Lagrange space: element plus cell-to-dof map.
///
/// Dofs are numbered entity by entity: all vertex dofs (vertex index), then
/// edge dofs (`num_vertices + edge index`), and so on. Entities carrying dofs
/// must have been created on the mesh before the space is built.
#[derive(Debug)]
pub struct FunctionSpace<C> {
    mesh: Arc<Mesh<C>>,
    element: FiniteElement,
    dofmap: AdjacencyList<usize>,
    num_dofs: usize,
}

impl<C: Communicator> FunctionSpace<C> {
    pub fn new(mesh: Arc<Mesh<C>>, element: FiniteElement) -> Result<Self, MeshError> {
        let topology = mesh.topology();
        let cell_type = topology.cell_type();
        if element.cell_type() != cell_type {
            return Err(MeshError::MixedCellTypes {
                first: cell_type,
                other: element.cell_type(),
            });
        }
        let tdim = topology.dim();
        let layout = element.dof_layout();
        let num_cells = topology.num_entities(tdim).unwrap_or(0);

        let mut offsets = vec![0usize; tdim + 2];
        for d in 0..=tdim {
            let per = layout.num_entity_dofs(d);
            let n = if per == 0 {
                0
            } else {
                topology.num_entities(d).ok_or(MeshError::MissingEntities(d))? * per
            };
            offsets[d + 1] = offsets[d] + n;
        }

        let mut dofs = Vec::with_capacity(num_cells * layout.num_dofs());
        for c in 0..num_cells {
            let mut cell_dofs = vec![0usize; layout.num_dofs()];
            for d in 0..=tdim {
                let per = layout.num_entity_dofs(d);
                if per == 0 {
                    continue;
                }
                let entities: &[usize] = if d == 0 {
                    topology.cell_vertices(c)
                } else if d == tdim {
                    std::slice::from_ref(&c)
                } else {
                    topology
                        .connectivity(tdim, d)
                        .ok_or(MeshError::MissingEntities(d))?
                        .links(c)
                };
                for (local, &entity) in entities.iter().enumerate() {
                    for (j, &ld) in layout.entity_dofs(d, local).iter().enumerate() {
                        cell_dofs[ld] = offsets[d] + entity * per + j;
                    }
                }
            }
            dofs.extend(cell_dofs);
        }
        let dofmap = AdjacencyList::regular(dofs, layout.num_dofs());
        log::debug!(
            "[rank {}] function space: {} dofs on {num_cells} cells",
            mesh.comm().rank(),
            offsets[tdim + 1]
        );
        Ok(Self {
            mesh,
            element,
            dofmap,
            num_dofs: offsets[tdim + 1],
        })
    }

    pub fn mesh(&self) -> &Arc<Mesh<C>> {
        &self.mesh
    }

    pub fn element(&self) -> &FiniteElement {
        &self.element
    }

    pub fn dofmap(&self) -> &AdjacencyList<usize> {
        &self.dofmap
    }

    /// Local (owned and ghost) dofs.
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn cell_dofs(&self, c: usize) -> &[usize] {
        self.dofmap.links(c)
    }
}

/// Coefficients of a scalar field in a [`FunctionSpace`].
#[derive(Debug)]
pub struct Function<C> {
    space: Arc<FunctionSpace<C>>,
    values: Vec<f64>,
}

impl<C: Communicator> Function<C> {
    /// The zero function.
    pub fn new(space: Arc<FunctionSpace<C>>) -> Self {
        let values = vec![0.0; space.num_dofs()];
        Self { space, values }
    }

    pub fn from_values(space: Arc<FunctionSpace<C>>, values: Vec<f64>) -> Result<Self, MeshError> {
        if values.len() != space.num_dofs() {
            return Err(MeshError::ValueLength {
                what: "function values",
                expected: space.num_dofs(),
                found: values.len(),
            });
        }
        Ok(Self { space, values })
    }

    pub fn function_space(&self) -> &Arc<FunctionSpace<C>> {
        &self.space
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Set every dof to `f` at the dof's physical point.
    pub fn interpolate(&mut self, f: impl Fn([f64; 3]) -> f64) -> Result<(), MeshError> {
        let space = &self.space;
        let mesh = space.mesh();
        let geometry = mesh.geometry();
        let cmap = FiniteElement::from_coordinate_element(geometry.cmap())?;
        let tab = cmap.tabulate(0, &space.element().points())?;
        for c in 0..space.dofmap().num_nodes() {
            let nodes = geometry.dofmap().links(c);
            for (p, &dof) in space.cell_dofs(c).iter().enumerate() {
                let mut x = [0.0; 3];
                for (&n, &phi) in nodes.iter().zip(tab.row(0, p)) {
                    let xn = geometry.node(n);
                    for k in 0..3 {
                        x[k] += phi * xn[k];
                    }
                }
                self.values[dof] = f(x);
            }
        }
        Ok(())
    }

    /// Values at the vertices of cell `c`, in reference vertex order.
    pub fn cell_vertex_values(&self, c: usize) -> Vec<f64> {
        let layout = self.space.element().dof_layout();
        let dofs = self.space.cell_dofs(c);
        (0..self.space.element().cell_type().num_vertices())
            .map(|v| self.values[dofs[layout.entity_dofs(0, v)[0]]])
            .collect()
    }

    /// Value at every mesh vertex (owned and ghost).
    pub fn vertex_values(&self) -> Vec<f64> {
        let topology = self.space.mesh().topology();
        let n = topology.num_entities(0).unwrap_or(0);
        let mut out = vec![0.0; n];
        for c in 0..self.space.dofmap().num_nodes() {
            for (&v, val) in topology.cell_vertices(c).iter().zip(self.cell_vertex_values(c)) {
                out[v] = val;
            }
        }
        out
    }
}
