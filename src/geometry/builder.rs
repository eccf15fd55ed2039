//! Mesh geometry: a dense node arena plus the cell-to-node dofmap.

use crate::geometry::element::CoordinateElement;
use crate::mesh_error::MeshError;
use crate::topology::adjacency::AdjacencyList;
use crate::topology::distributed::Topology;

/// Node coordinates (padded to 3 components) and the node dofmap.
///
/// Nodes are indexed by their position in the sorted list of unique global
/// node ids referenced by this rank's cells.
#[derive(Clone, Debug)]
pub struct Geometry {
    element: CoordinateElement,
    gdim: usize,
    dofmap: AdjacencyList<usize>,
    x: Vec<f64>,
    input_global_indices: Vec<i64>,
}

impl Geometry {
    /// Geometric dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.gdim
    }

    pub fn cmap(&self) -> &CoordinateElement {
        &self.element
    }

    pub fn dofmap(&self) -> &AdjacencyList<usize> {
        &self.dofmap
    }

    /// Flattened `(num_nodes, 3)` coordinates.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn num_nodes(&self) -> usize {
        self.x.len() / 3
    }

    /// Input global id of every local node.
    pub fn input_global_indices(&self) -> &[i64] {
        &self.input_global_indices
    }

    /// Coordinates of node `i`.
    pub fn node(&self, i: usize) -> [f64; 3] {
        [self.x[3 * i], self.x[3 * i + 1], self.x[3 * i + 2]]
    }

    /// Coordinate dofs of cell `c`: 3 values per node, in dofmap order.
    pub fn cell_coordinates(&self, c: usize) -> Vec<f64> {
        self.dofmap
            .links(c)
            .iter()
            .flat_map(|&n| self.node(n))
            .collect()
    }
}

/// Build the geometry of `topology`.
///
/// * `nodes` - sorted unique global node ids used by `cells`.
/// * `cells` - node connectivity, one row per topology cell, in topology
///   cell order.
/// * `coords` - `(nodes.len(), gdim)` coordinates aligned with `nodes`.
pub fn create_geometry(
    topology: &Topology,
    element: CoordinateElement,
    nodes: &[i64],
    cells: &[i64],
    coords: &[f64],
    gdim: usize,
) -> Result<Geometry, MeshError> {
    let cell_type = topology.cell_type();
    if element.cell_shape() != cell_type {
        return Err(MeshError::MixedCellTypes {
            first: cell_type,
            other: element.cell_shape(),
        });
    }
    if gdim < cell_type.dimension() || gdim > 3 {
        return Err(MeshError::InvalidGeometricDimension { cell_type, gdim });
    }
    let nd = element.create_dof_layout().num_dofs();
    let num_cells = topology.num_entities(topology.dim()).unwrap_or(0);
    if cells.len() != num_cells * nd {
        return Err(MeshError::ConnectivityStride {
            len: cells.len(),
            stride: nd,
        });
    }
    if coords.len() != nodes.len() * gdim {
        return Err(MeshError::CoordinateShape {
            len: coords.len(),
            rows: nodes.len(),
            gdim,
        });
    }

    let dofs: Result<Vec<usize>, MeshError> = cells
        .iter()
        .map(|&g| nodes.binary_search(&g).map_err(|_| MeshError::UnresolvedNode(g)))
        .collect();
    let dofmap = AdjacencyList::regular(dofs?, nd);

    let mut x = vec![0.0; 3 * nodes.len()];
    for (dst, src) in x.chunks_exact_mut(3).zip(coords.chunks_exact(gdim.max(1))) {
        dst[..gdim].copy_from_slice(src);
    }

    Ok(Geometry {
        element,
        gdim,
        dofmap,
        x,
        input_global_indices: nodes.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::topology::cell_type::CellType;
    use crate::topology::distributed::create_topology;

    fn square_topology() -> Topology {
        create_topology(&NoComm, &[0, 1, 2, 1, 3, 2], &[0, 1], &[], CellType::Triangle, &[0, 1, 2, 3])
            .unwrap()
    }

    #[test]
    fn arena_is_indexed_by_sorted_node_position() {
        let t = square_topology();
        let el = CoordinateElement::new(CellType::Triangle, 1).unwrap();
        let nodes = [0, 1, 2, 3];
        let coords = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let g = create_geometry(&t, el, &nodes, &[0, 1, 2, 1, 3, 2], &coords, 2).unwrap();
        assert_eq!(g.dofmap().links(1), &[1, 3, 2]);
        assert_eq!(g.node(3), [1.0, 1.0, 0.0]);
        assert_eq!(g.cell_coordinates(0)[3..6], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn missing_node_is_unresolved() {
        let t = square_topology();
        let el = CoordinateElement::new(CellType::Triangle, 1).unwrap();
        let err = create_geometry(&t, el, &[0, 1, 2], &[0, 1, 2, 1, 3, 2], &[0.0; 6], 2).unwrap_err();
        assert_eq!(err, MeshError::UnresolvedNode(3));
    }

    #[test]
    fn gdim_below_tdim_is_rejected() {
        let t = square_topology();
        let el = CoordinateElement::new(CellType::Triangle, 1).unwrap();
        let err = create_geometry(&t, el, &[0, 1, 2, 3], &[0, 1, 2, 1, 3, 2], &[0.0; 4], 1).unwrap_err();
        assert!(matches!(err, MeshError::InvalidGeometricDimension { gdim: 1, .. }));
    }
}
