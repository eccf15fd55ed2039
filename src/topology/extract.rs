//! Strip higher-order nodes from cell connectivity.

use crate::geometry::element::ElementDofLayout;
use crate::topology::cell_type::CellType;

/// Keep only the vertex nodes of each cell, in reference vertex order.
///
/// `cells` is the flattened node connectivity with stride
/// `layout.num_dofs()`. For degree-1 geometry this is the identity. The
/// layout is trusted: a layout that does not describe `cells` yields a
/// wrong topology rather than an error.
pub fn extract_topology(cell_type: CellType, layout: &ElementDofLayout, cells: &[i64]) -> Vec<i64> {
    let num_nodes = layout.num_dofs();
    let num_vertices = cell_type.num_vertices();
    if num_nodes == 0 {
        return Vec::new();
    }
    let vertex_positions: Vec<usize> = (0..num_vertices)
        .map(|v| layout.entity_dofs(0, v)[0])
        .collect();
    let mut topology = Vec::with_capacity(cells.len() / num_nodes * num_vertices);
    for cell in cells.chunks_exact(num_nodes) {
        topology.extend(vertex_positions.iter().map(|&p| cell[p]));
    }
    topology
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_one_is_identity() {
        let layout = ElementDofLayout::lagrange(CellType::Triangle, 1);
        let cells = vec![0, 1, 2, 1, 3, 2];
        assert_eq!(extract_topology(CellType::Triangle, &layout, &cells), cells);
    }

    #[test]
    fn quadratic_triangle_keeps_vertices() {
        let layout = ElementDofLayout::lagrange(CellType::Triangle, 2);
        let cells = vec![10, 11, 12, 20, 21, 22, 11, 13, 12, 23, 20, 24];
        assert_eq!(
            extract_topology(CellType::Triangle, &layout, &cells),
            vec![10, 11, 12, 11, 13, 12]
        );
    }
}
