//! Build the local *dual graph* of a rank's owned cells.
//
// Each *cell* is a graph node; an undirected edge joins two cells that share
// a facet, i.e. whose facet vertex sets are equal. Facets are matched by a
// canonical key: the facet's global vertex ids, sorted, padded with `None`
// up to the largest facet size of the cell type (a prism has triangle and
// quadrilateral facets).
//
// Facets seen exactly once are *unmatched*: they lie either on the physical
// boundary or on a process boundary. Which one is decided later, during
// distributed topology construction.
//
// The graph is **symmetrised** (i↔j appear in both lists) and **self-free**.

use crate::mesh_error::MeshError;
use crate::topology::adjacency::AdjacencyList;
use crate::topology::cell_type::CellType;
use itertools::Itertools;

/// Canonical facet key: sorted vertex ids, `None`-padded.
pub type FacetKey = Vec<Option<i64>>;

/// Result of [`build_local_dual_graph`].
#[derive(Debug, Clone)]
pub struct LocalDualGraph {
    /// Cell → neighbouring cells (local owned indices, ascending).
    pub graph: AdjacencyList<usize>,
    /// Keys of facets seen once, in ascending key order.
    pub unmatched_facets: Vec<FacetKey>,
    /// Owned cell attached to each unmatched facet.
    pub facet_attached_cells: Vec<usize>,
    /// Largest vertex id referenced, `None` for an empty table.
    pub max_vertex: Option<i64>,
}

impl LocalDualGraph {
    /// Sorted, deduplicated vertices of all unmatched facets (padding removed).
    pub fn boundary_vertices(&self) -> Vec<i64> {
        self.unmatched_facets
            .iter()
            .flat_map(|f| f.iter().flatten().copied())
            .sorted_unstable()
            .dedup()
            .collect()
    }
}

/// Canonical key of one facet given its vertex ids.
pub fn facet_key(vertices: impl IntoIterator<Item = i64>, width: usize) -> FacetKey {
    let mut key: FacetKey = vertices.into_iter().map(Some).collect();
    key.sort_unstable();
    key.resize(width, None);
    // `None < Some(_)`: move the padding behind the vertices
    let pad = key.iter().take_while(|v| v.is_none()).count();
    key.rotate_left(pad);
    key
}

/// Build the dual graph of `cells` (flattened vertex connectivity with stride
/// `cell_type.num_vertices()`).
///
/// More than two cells on one facet cannot be a valid mesh and is reported
/// as [`MeshError::InconsistentSharedFacet`].
pub fn build_local_dual_graph(
    cell_type: CellType,
    cells: &[i64],
) -> Result<LocalDualGraph, MeshError> {
    let nv = cell_type.num_vertices();
    if cells.len() % nv != 0 {
        return Err(MeshError::ConnectivityStride {
            len: cells.len(),
            stride: nv,
        });
    }
    let num_cells = cells.len() / nv;
    let Some(facet_dim) = cell_type.dimension().checked_sub(1) else {
        return Err(MeshError::UnsupportedElement(format!(
            "{cell_type:?} cells have no facets"
        )));
    };
    let width = cell_type.max_facet_vertices();

    // 1. (facet key, cell) for every facet of every cell
    let mut facets: Vec<(FacetKey, usize)> =
        Vec::with_capacity(num_cells * cell_type.num_sub_entities(facet_dim));
    for (c, cell) in cells.chunks_exact(nv).enumerate() {
        for local in cell_type.sub_entities(facet_dim) {
            facets.push((facet_key(local.iter().map(|&v| cell[v]), width), c));
        }
    }
    facets.sort_unstable();

    // 2. group equal keys
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); num_cells];
    let mut unmatched_facets = Vec::new();
    let mut facet_attached_cells = Vec::new();
    for (key, group) in &facets.into_iter().chunk_by(|(k, _)| k.clone()) {
        let owners: Vec<usize> = group.map(|(_, c)| c).collect();
        match owners.as_slice() {
            [c] => {
                unmatched_facets.push(key);
                facet_attached_cells.push(*c);
            }
            [a, b] => {
                adj[*a].push(*b);
                adj[*b].push(*a);
            }
            _ => {
                return Err(MeshError::InconsistentSharedFacet {
                    vertices: key.into_iter().flatten().collect(),
                    count: owners.len(),
                });
            }
        }
    }
    for nbrs in &mut adj {
        nbrs.sort_unstable();
        nbrs.dedup();
    }

    log::trace!(
        "local dual graph: {num_cells} cells, {} unmatched facets",
        unmatched_facets.len()
    );

    Ok(LocalDualGraph {
        graph: AdjacencyList::from_lists(adj),
        unmatched_facets,
        facet_attached_cells,
        max_vertex: cells.iter().copied().max(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_cells_have_no_dual_graph() {
        let err = build_local_dual_graph(CellType::Point, &[0, 1]).unwrap_err();
        assert!(matches!(err, MeshError::UnsupportedElement(_)));
    }

    #[test]
    fn dual_graph_two_cells() {
        // two triangles sharing edge (1, 2)
        let dg = build_local_dual_graph(CellType::Triangle, &[0, 1, 2, 1, 3, 2]).unwrap();
        assert_eq!(dg.graph.links(0), &[1]);
        assert_eq!(dg.graph.links(1), &[0]);
        assert_eq!(dg.unmatched_facets.len(), 4);
        assert_eq!(dg.boundary_vertices(), vec![0, 1, 2, 3]);
        assert_eq!(dg.max_vertex, Some(3));
    }

    #[test]
    fn prism_keys_are_padded_without_sentinels() {
        let dg = build_local_dual_graph(CellType::Prism, &[0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(dg.unmatched_facets.len(), 5);
        assert!(dg.unmatched_facets.iter().all(|k| k.len() == 4));
        let tri = dg
            .unmatched_facets
            .iter()
            .find(|k| k[3].is_none())
            .unwrap();
        assert!(tri[..3].iter().all(Option::is_some));
        assert_eq!(dg.boundary_vertices(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn three_cells_on_one_facet_is_an_error() {
        let cells = [0, 1, 2, 1, 2, 3, 1, 2, 4];
        let err = build_local_dual_graph(CellType::Triangle, &cells).unwrap_err();
        assert_eq!(
            err,
            MeshError::InconsistentSharedFacet {
                vertices: vec![1, 2],
                count: 3
            }
        );
    }

    #[test]
    fn facet_key_sorts_and_pads() {
        assert_eq!(facet_key([5, 2, 9], 4), vec![Some(2), Some(5), Some(9), None]);
    }
}
