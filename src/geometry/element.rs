//! Coordinate element descriptor and its degree-of-freedom layout.
//!
//! Geometry nodes of a Lagrange coordinate element are ordered vertices
//! first, then the interior nodes of each edge, each face and finally the
//! cell interior, sub-entities in reference order.

use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;
use serde::{Deserialize, Serialize};

/// Lagrange coordinate element: cell shape plus polynomial degree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordinateElement {
    cell_type: CellType,
    degree: usize,
}

impl CoordinateElement {
    pub fn new(cell_type: CellType, degree: usize) -> Result<Self, MeshError> {
        if cell_type == CellType::Point || degree == 0 {
            return Err(MeshError::UnsupportedElement(format!(
                "coordinate element of degree {degree} on {cell_type:?}"
            )));
        }
        if cell_type == CellType::Prism && degree > 1 {
            return Err(MeshError::UnsupportedElement(format!(
                "prism coordinate element of degree {degree}"
            )));
        }
        Ok(Self { cell_type, degree })
    }

    #[inline]
    pub fn cell_shape(&self) -> CellType {
        self.cell_type
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn create_dof_layout(&self) -> ElementDofLayout {
        ElementDofLayout::lagrange(self.cell_type, self.degree)
    }

    /// True when some edge or face carries more than one node, so that
    /// node order on shared entities depends on the entity orientation.
    pub fn needs_dof_permutations(&self) -> bool {
        let tdim = self.cell_type.dimension();
        (1..tdim).any(|d| {
            (0..self.cell_type.num_sub_entities(d)).any(|e| {
                interior_dofs(self.cell_type.sub_entity_type(d, e), self.degree) > 1
            })
        })
    }
}

/// Local node indices attached to each sub-entity of the reference cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementDofLayout {
    cell_type: CellType,
    entity_dofs: Vec<Vec<Vec<usize>>>,
    num_dofs: usize,
}

impl ElementDofLayout {
    pub fn lagrange(cell_type: CellType, degree: usize) -> Self {
        let tdim = cell_type.dimension();
        let mut next = 0;
        let mut entity_dofs = Vec::with_capacity(tdim + 1);
        for d in 0..=tdim {
            let per_dim = (0..cell_type.num_sub_entities(d))
                .map(|e| {
                    let n = interior_dofs(cell_type.sub_entity_type(d, e), degree);
                    let dofs: Vec<usize> = (next..next + n).collect();
                    next += n;
                    dofs
                })
                .collect();
            entity_dofs.push(per_dim);
        }
        Self {
            cell_type,
            entity_dofs,
            num_dofs: next,
        }
    }

    #[inline]
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Local dofs of sub-entity `entity` of dimension `dim`.
    pub fn entity_dofs(&self, dim: usize, entity: usize) -> &[usize] {
        &self.entity_dofs[dim][entity]
    }

    /// Dofs per entity of dimension `dim` (maximum over entity shapes).
    pub fn num_entity_dofs(&self, dim: usize) -> usize {
        self.entity_dofs
            .get(dim)
            .and_then(|per| per.iter().map(Vec::len).max())
            .unwrap_or(0)
    }
}

/// Number of Lagrange nodes strictly inside an entity of shape `t`.
fn interior_dofs(t: CellType, p: usize) -> usize {
    let q = p.saturating_sub(1);
    match t {
        CellType::Point => 1,
        CellType::Interval => q,
        CellType::Triangle => q * p.saturating_sub(2) / 2,
        CellType::Quadrilateral => q * q,
        CellType::Tetrahedron => q * p.saturating_sub(2) * p.saturating_sub(3) / 6,
        CellType::Prism => q * p.saturating_sub(2) / 2 * q,
        CellType::Hexahedron => q * q * q,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lagrange_node_counts() {
        let n = |c, p| ElementDofLayout::lagrange(c, p).num_dofs();
        assert_eq!(n(CellType::Triangle, 1), 3);
        assert_eq!(n(CellType::Triangle, 2), 6);
        assert_eq!(n(CellType::Triangle, 3), 10);
        assert_eq!(n(CellType::Quadrilateral, 2), 9);
        assert_eq!(n(CellType::Tetrahedron, 2), 10);
        assert_eq!(n(CellType::Hexahedron, 2), 27);
        assert_eq!(n(CellType::Prism, 1), 6);
    }

    #[test]
    fn vertex_dofs_come_first() {
        let layout = ElementDofLayout::lagrange(CellType::Triangle, 2);
        for v in 0..3 {
            assert_eq!(layout.entity_dofs(0, v), &[v]);
        }
        assert_eq!(layout.entity_dofs(1, 0), &[3]);
        assert_eq!(layout.num_entity_dofs(1), 1);
        assert_eq!(layout.num_entity_dofs(2), 0);
    }

    #[test]
    fn permutations_needed_from_degree_three() {
        let e2 = CoordinateElement::new(CellType::Triangle, 2).unwrap();
        let e3 = CoordinateElement::new(CellType::Triangle, 3).unwrap();
        assert!(!e2.needs_dof_permutations());
        assert!(e3.needs_dof_permutations());
        assert!(CoordinateElement::new(CellType::Prism, 2).is_err());
    }
}
