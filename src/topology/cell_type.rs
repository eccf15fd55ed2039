//! Cell type metadata and reference-cell data.
//!
//! Vertex and sub-entity numbering follows the UFC convention: simplices list
//! edge `i` opposite vertex `i` in 2-D, tensor-product cells number vertices
//! lexicographically (`x` fastest).

use serde::{Deserialize, Serialize};

/// Supported cell shapes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum CellType {
    /// 0D vertex.
    Point,
    /// 1D segment.
    Interval,
    /// 2D simplex.
    Triangle,
    /// 2D tensor-product cell.
    Quadrilateral,
    /// 3D simplex.
    Tetrahedron,
    /// 3D wedge.
    Prism,
    /// 3D tensor-product cell.
    Hexahedron,
}

impl Default for CellType {
    fn default() -> Self {
        CellType::Point
    }
}

const ALL: [usize; 8] = [0, 1, 2, 3, 4, 5, 6, 7];
const SINGLE: [[usize; 1]; 8] = [[0], [1], [2], [3], [4], [5], [6], [7]];

const INTERVAL_VERTS: [[f64; 3]; 2] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
const TRIANGLE_VERTS: [[f64; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const QUAD_VERTS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
];
const TET_VERTS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];
const PRISM_VERTS: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
];
const HEX_VERTS: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
];

const TRIANGLE_EDGES: [&[usize]; 3] = [&[1, 2], &[0, 2], &[0, 1]];
const QUAD_EDGES: [&[usize]; 4] = [&[0, 1], &[0, 2], &[1, 3], &[2, 3]];
const TET_EDGES: [&[usize]; 6] = [&[2, 3], &[1, 3], &[1, 2], &[0, 3], &[0, 2], &[0, 1]];
const TET_FACES: [&[usize]; 4] = [&[1, 2, 3], &[0, 2, 3], &[0, 1, 3], &[0, 1, 2]];
const PRISM_EDGES: [&[usize]; 9] = [
    &[0, 1],
    &[0, 2],
    &[0, 3],
    &[1, 2],
    &[1, 4],
    &[2, 5],
    &[3, 4],
    &[3, 5],
    &[4, 5],
];
const PRISM_FACES: [&[usize]; 5] = [
    &[0, 1, 2],
    &[0, 1, 3, 4],
    &[0, 2, 3, 5],
    &[1, 2, 4, 5],
    &[3, 4, 5],
];
const HEX_EDGES: [&[usize]; 12] = [
    &[0, 1],
    &[0, 2],
    &[0, 4],
    &[1, 3],
    &[1, 5],
    &[2, 3],
    &[2, 6],
    &[3, 7],
    &[4, 5],
    &[4, 6],
    &[5, 7],
    &[6, 7],
];
const HEX_FACES: [&[usize]; 6] = [
    &[0, 1, 2, 3],
    &[0, 1, 4, 5],
    &[0, 2, 4, 6],
    &[1, 3, 5, 7],
    &[2, 3, 6, 7],
    &[4, 5, 6, 7],
];

impl CellType {
    /// Topological dimension of the cell.
    pub fn dimension(self) -> usize {
        match self {
            CellType::Point => 0,
            CellType::Interval => 1,
            CellType::Triangle | CellType::Quadrilateral => 2,
            CellType::Tetrahedron | CellType::Prism | CellType::Hexahedron => 3,
        }
    }

    /// Number of vertices of the cell.
    pub fn num_vertices(self) -> usize {
        match self {
            CellType::Point => 1,
            CellType::Interval => 2,
            CellType::Triangle => 3,
            CellType::Quadrilateral | CellType::Tetrahedron => 4,
            CellType::Prism => 6,
            CellType::Hexahedron => 8,
        }
    }

    /// True for intervals, triangles and tetrahedra.
    pub fn is_simplex(self) -> bool {
        matches!(
            self,
            CellType::Point | CellType::Interval | CellType::Triangle | CellType::Tetrahedron
        )
    }

    /// Reference vertex coordinates, padded to three components.
    pub fn reference_vertices(self) -> &'static [[f64; 3]] {
        match self {
            CellType::Point => &INTERVAL_VERTS[..1],
            CellType::Interval => &INTERVAL_VERTS,
            CellType::Triangle => &TRIANGLE_VERTS,
            CellType::Quadrilateral => &QUAD_VERTS,
            CellType::Tetrahedron => &TET_VERTS,
            CellType::Prism => &PRISM_VERTS,
            CellType::Hexahedron => &HEX_VERTS,
        }
    }

    /// Measure of the reference cell.
    pub fn reference_volume(self) -> f64 {
        match self {
            CellType::Point => 1.0,
            CellType::Interval | CellType::Quadrilateral | CellType::Hexahedron => 1.0,
            CellType::Triangle | CellType::Prism => 0.5,
            CellType::Tetrahedron => 1.0 / 6.0,
        }
    }

    /// Number of sub-entities of dimension `dim`.
    pub fn num_sub_entities(self, dim: usize) -> usize {
        let tdim = self.dimension();
        if dim > tdim {
            return 0;
        }
        if dim == tdim {
            return 1;
        }
        if dim == 0 {
            return self.num_vertices();
        }
        self.edge_or_face_table(dim).len()
    }

    /// Local vertex indices of sub-entity `index` of dimension `dim`.
    ///
    /// # Panics
    /// Panics if `index` is out of range for the dimension.
    pub fn sub_entity(self, dim: usize, index: usize) -> &'static [usize] {
        let tdim = self.dimension();
        if dim == tdim {
            assert_eq!(index, 0, "a cell has exactly one entity of its own dimension");
            return &ALL[..self.num_vertices()];
        }
        if dim == 0 {
            return &SINGLE[index];
        }
        self.edge_or_face_table(dim)[index]
    }

    /// Iterate the local vertex lists of all sub-entities of dimension `dim`.
    pub fn sub_entities(self, dim: usize) -> impl Iterator<Item = &'static [usize]> {
        (0..self.num_sub_entities(dim)).map(move |i| self.sub_entity(dim, i))
    }

    /// Cell type of sub-entity `index` of dimension `dim`.
    pub fn sub_entity_type(self, dim: usize, index: usize) -> CellType {
        match dim {
            0 => CellType::Point,
            1 => CellType::Interval,
            2 if self.dimension() == 2 => self,
            2 => match self.sub_entity(2, index).len() {
                3 => CellType::Triangle,
                _ => CellType::Quadrilateral,
            },
            _ => self,
        }
    }

    /// Largest number of vertices on any facet of this cell type.
    pub fn max_facet_vertices(self) -> usize {
        let tdim = self.dimension();
        if tdim == 0 {
            return 0;
        }
        self.sub_entities(tdim - 1)
            .map(|f| f.len())
            .max()
            .unwrap_or(0)
    }

    fn edge_or_face_table(self, dim: usize) -> &'static [&'static [usize]] {
        match (self, dim) {
            (CellType::Triangle, 1) => &TRIANGLE_EDGES,
            (CellType::Quadrilateral, 1) => &QUAD_EDGES,
            (CellType::Tetrahedron, 1) => &TET_EDGES,
            (CellType::Tetrahedron, 2) => &TET_FACES,
            (CellType::Prism, 1) => &PRISM_EDGES,
            (CellType::Prism, 2) => &PRISM_FACES,
            (CellType::Hexahedron, 1) => &HEX_EDGES,
            (CellType::Hexahedron, 2) => &HEX_FACES,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_entity_counts() {
        assert_eq!(CellType::Triangle.num_sub_entities(1), 3);
        assert_eq!(CellType::Tetrahedron.num_sub_entities(1), 6);
        assert_eq!(CellType::Tetrahedron.num_sub_entities(2), 4);
        assert_eq!(CellType::Hexahedron.num_sub_entities(2), 6);
        assert_eq!(CellType::Prism.num_sub_entities(1), 9);
        assert_eq!(CellType::Interval.num_sub_entities(0), 2);
        assert_eq!(CellType::Interval.sub_entity(0, 1), &[1]);
    }

    #[test]
    fn prism_has_mixed_facets() {
        assert_eq!(CellType::Prism.max_facet_vertices(), 4);
        assert_eq!(CellType::Prism.sub_entity_type(2, 0), CellType::Triangle);
        assert_eq!(CellType::Prism.sub_entity_type(2, 1), CellType::Quadrilateral);
    }

    #[test]
    fn simplex_edges_are_opposite_vertices() {
        for (i, e) in CellType::Triangle.sub_entities(1).enumerate() {
            assert!(!e.contains(&i));
        }
        for (i, f) in CellType::Tetrahedron.sub_entities(2).enumerate() {
            assert!(!f.contains(&i));
        }
    }
}
