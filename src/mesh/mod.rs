//! Distributed mesh construction from cell connectivity or cut fragments.
//!
//! [`create_mesh`] follows the usual pipeline: vertex extraction, local dual
//! graph, optional locality reordering, distributed topology, coordinate
//! redistribution and geometry. Cells are not repartitioned: each rank keeps
//! the cells it passes in. [`create_cut_mesh`] merges cut fragments into a
//! degree-1 mesh and returns the parent cell of every mesh cell.

pub mod generation;

use crate::algs::communicator::Communicator;
use crate::algs::dual_graph::build_local_dual_graph;
use crate::algs::exchange::{agree, all_gather_u64, exclusive_scan_sum};
use crate::algs::rcm::reorder_rcm;
use crate::geometry::builder::{Geometry, create_geometry};
use crate::geometry::distribute::distribute_data;
use crate::geometry::element::CoordinateElement;
use crate::level_set::cut::{CutCell, CutCells};
use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;
use crate::topology::distributed::{Topology, create_topology};
use crate::topology::extract::extract_topology;
use crate::topology::reconcile::match_shared_facets;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Options for mesh construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Apply reverse Cuthill-McKee to the owned cells.
    pub reorder_cells: bool,
    /// Cut-fragment vertices closer than this (per coordinate) are merged.
    pub merge_tolerance: f64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            reorder_cells: true,
            merge_tolerance: 1e-10,
        }
    }
}

/// A distributed mesh: topology and geometry on one rank.
#[derive(Clone, Debug)]
pub struct Mesh<C> {
    comm: C,
    topology: Topology,
    geometry: Geometry,
}

impl<C: Communicator> Mesh<C> {
    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Mutable topology, e.g. to create entities on demand.
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Owned plus ghost cells.
    pub fn num_cells(&self) -> usize {
        self.topology.num_entities(self.topology.dim()).unwrap_or(0)
    }

    /// Coordinate dofs of local cell `c` (3 values per node).
    pub fn cell_coordinates(&self, c: usize) -> Vec<f64> {
        self.geometry.cell_coordinates(c)
    }

    /// Collective: create the entities of dimension `dim`.
    pub fn create_entities(&mut self, dim: usize) -> Result<bool, MeshError> {
        self.topology.create_entities(&self.comm, dim)
    }
}

fn check_mesh_input(
    cells: &[i64],
    element: &CoordinateElement,
    x: &[f64],
    xshape: (usize, usize),
) -> Result<(), MeshError> {
    let nd = element.create_dof_layout().num_dofs();
    if cells.len() % nd != 0 {
        return Err(MeshError::ConnectivityStride {
            len: cells.len(),
            stride: nd,
        });
    }
    let (rows, gdim) = xshape;
    if x.len() != rows * gdim {
        return Err(MeshError::CoordinateShape {
            len: x.len(),
            rows,
            gdim,
        });
    }
    let cell_type = element.cell_shape();
    if gdim < cell_type.dimension() || gdim > 3 {
        return Err(MeshError::InvalidGeometricDimension { cell_type, gdim });
    }
    Ok(())
}

fn permute_rows<T: Copy>(data: &[T], stride: usize, order: &[usize]) -> Vec<T> {
    order
        .iter()
        .flat_map(|&old| data[old * stride..(old + 1) * stride].iter().copied())
        .collect()
}

/// Collective: build a mesh from this rank's cells.
///
/// * `cells` - node connectivity (global node ids), stride
///   `element.create_dof_layout().num_dofs()`.
/// * `x`, `xshape` - this rank's block of node coordinates, `(rows, gdim)`.
///   Node `offset + i` is row `i`, offsets from a prefix sum over ranks.
///
/// Shapes are checked before any exchange; a failure on any rank makes
/// every rank return an error.
pub fn create_mesh<C: Communicator + Clone>(
    comm: &C,
    cells: &[i64],
    element: CoordinateElement,
    x: &[f64],
    xshape: (usize, usize),
    config: &MeshConfig,
) -> Result<Mesh<C>, MeshError> {
    build_mesh(comm, cells, element, x, xshape, config).map(|(mesh, _)| mesh)
}

/// [`create_mesh`], also returning `order` with `order[new] = old` local
/// input cell index.
fn build_mesh<C: Communicator + Clone>(
    comm: &C,
    cells: &[i64],
    element: CoordinateElement,
    x: &[f64],
    xshape: (usize, usize),
    config: &MeshConfig,
) -> Result<(Mesh<C>, Vec<usize>), MeshError> {
    agree(comm, check_mesh_input(cells, &element, x, xshape), "mesh input")?;
    let rank = comm.rank();
    let cell_type = element.cell_shape();
    let layout = element.create_dof_layout();
    let nd = layout.num_dofs();
    let nv = cell_type.num_vertices();
    let num_cells = cells.len() / nd;
    let offset = exclusive_scan_sum(comm, num_cells as u64)? as i64;

    let vertex_cells = extract_topology(cell_type, &layout, cells);
    let dual = agree(
        comm,
        build_local_dual_graph(cell_type, &vertex_cells),
        "local dual graph",
    )?;
    let facets: Vec<Vec<i64>> = dual
        .unmatched_facets
        .iter()
        .map(|f| f.iter().flatten().copied().collect())
        .collect();
    let shared = match_shared_facets(comm, &facets)?;
    log::debug!(
        "[rank {rank}] {num_cells} cells, {} unmatched facets ({} on process boundaries)",
        facets.len(),
        shared.iter().filter(|s| s.is_some()).count()
    );
    let boundary_vertices = dual.boundary_vertices();

    let order: Vec<usize> = if config.reorder_cells {
        let remap = reorder_rcm(&dual.graph);
        let mut order = vec![0; num_cells];
        for (old, &new) in remap.iter().enumerate() {
            order[new] = old;
        }
        order
    } else {
        (0..num_cells).collect()
    };
    let vertex_cells = permute_rows(&vertex_cells, nv, &order);
    let node_cells = permute_rows(cells, nd, &order);
    let original: Vec<i64> = order.iter().map(|&o| offset + o as i64).collect();

    let mut topology = create_topology(comm, &vertex_cells, &original, &[], cell_type, &boundary_vertices)?;
    for d in 1..cell_type.dimension() {
        if layout.num_entity_dofs(d) > 0 {
            topology.create_entities(comm, d)?;
        }
    }
    if element.needs_dof_permutations() {
        topology.create_entity_permutations()?;
    }

    let mut nodes = node_cells.clone();
    nodes.sort_unstable();
    nodes.dedup();
    let coords = distribute_data(comm, &nodes, x, xshape)?;
    let geometry = agree(
        comm,
        create_geometry(&topology, element, &nodes, &node_cells, &coords, xshape.1),
        "geometry",
    )?;

    Ok((
        Mesh {
            comm: comm.clone(),
            topology,
            geometry,
        },
        order,
    ))
}

const CELL_CODES: [CellType; 7] = [
    CellType::Point,
    CellType::Interval,
    CellType::Triangle,
    CellType::Quadrilateral,
    CellType::Tetrahedron,
    CellType::Prism,
    CellType::Hexahedron,
];

fn cell_code(t: CellType) -> u64 {
    CELL_CODES.iter().position(|&c| c == t).map_or(0, |p| p as u64 + 1)
}

/// Merges fragment vertices closer than a tolerance.
///
/// Points are hashed into boxes of side `tol`; a query scans the 3x3x3 boxes
/// around its own, so every stored point within `tol` is found.
struct VertexMerger {
    tol: f64,
    buckets: HashMap<[i64; 3], Vec<usize>>,
    points: Vec<[f64; 3]>,
}

impl VertexMerger {
    fn new(tol: f64) -> Self {
        Self {
            tol,
            buckets: HashMap::new(),
            points: Vec::new(),
        }
    }

    fn bucket(&self, p: &[f64; 3]) -> [i64; 3] {
        p.map(|v| (v / self.tol).floor() as i64)
    }

    /// Id of the closest stored point within `tol`, else a new id.
    fn insert(&mut self, p: [f64; 3]) -> (usize, bool) {
        let home = self.bucket(&p);
        let mut best: Option<(f64, usize)> = None;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let key = [home[0] + dx, home[1] + dy, home[2] + dz];
                    for &id in self.buckets.get(&key).into_iter().flatten() {
                        let q = &self.points[id];
                        let d = p.iter().zip(q).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt();
                        if d <= self.tol && best.is_none_or(|(bd, bid)| d < bd || (d == bd && id < bid)) {
                            best = Some((d, id));
                        }
                    }
                }
            }
        }
        if let Some((_, id)) = best {
            return (id, false);
        }
        let id = self.points.len();
        self.points.push(p);
        self.buckets.entry(home).or_default().push(id);
        (id, true)
    }
}

/// Shape checks on one cut cell before any of its data is indexed.
fn check_fragments(cc: &CutCell) -> Result<(), MeshError> {
    let stride = cc.gdim.max(1);
    if cc.gdim > 3 || cc.vertex_coords.len() % stride != 0 {
        return Err(MeshError::CoordinateShape {
            len: cc.vertex_coords.len(),
            rows: cc.vertex_coords.len() / stride,
            gdim: cc.gdim,
        });
    }
    let num_vertices = cc.vertex_coords.len() / stride;
    let num_fragments = cc.connectivity.len();
    if cc.types.len() != num_fragments {
        return Err(MeshError::ValueLength {
            what: "cut fragment types",
            expected: num_fragments,
            found: cc.types.len(),
        });
    }
    if cc.parent_cell_index.len() != num_fragments {
        return Err(MeshError::ValueLength {
            what: "cut fragment parents",
            expected: num_fragments,
            found: cc.parent_cell_index.len(),
        });
    }
    for (frag, t) in cc.connectivity.iter().zip(&cc.types) {
        if frag.len() != t.num_vertices() {
            return Err(MeshError::ConnectivityStride {
                len: frag.len(),
                stride: t.num_vertices(),
            });
        }
        if let Some(&v) = frag.iter().find(|&&v| v >= num_vertices) {
            return Err(MeshError::InvalidIndex {
                index: v,
                size: num_vertices,
            });
        }
    }
    Ok(())
}

/// Collective: build a degree-1 mesh from cut fragments.
///
/// Fragment vertices on one rank lying within `config.merge_tolerance` of
/// each other (Euclidean distance) are merged; vertex ids are made global by
/// a prefix sum. Fragments on different ranks never share vertices, so the
/// cut mesh has no facet connectivity across ranks. Returns the mesh and, per
/// mesh cell in final cell order, the background cell the fragment was cut
/// from.
///
/// Malformed fragments (ragged coordinates, out-of-range vertex ids,
/// mismatched type or parent lists) fail on every rank.
pub fn create_cut_mesh<C: Communicator + Clone>(
    comm: &C,
    cut_cells: &CutCells,
    config: &MeshConfig,
) -> Result<(Mesh<C>, Vec<i32>), MeshError> {
    let rank = comm.rank();

    // 1. fragment type and gdim, agreed over ranks
    let mut local_type: Option<CellType> = None;
    let mut local_check = Ok(());
    let mut gdim = 0usize;
    for cc in &cut_cells.cut_cells {
        if let Err(e) = check_fragments(cc) {
            local_check = local_check.and(Err(e));
            continue;
        }
        gdim = gdim.max(cc.gdim);
        for &t in &cc.types {
            match local_type {
                Some(first) if first != t => {
                    let err = MeshError::MixedCellTypes { first, other: t };
                    local_check = local_check.and(Err(err));
                }
                _ => local_type = Some(t),
            }
        }
    }
    agree(comm, local_check, "cut fragments")?;
    let codes = all_gather_u64(comm, local_type.map_or(0, cell_code))?;
    let gdims = all_gather_u64(comm, gdim as u64)?;
    let mut global_type: Option<CellType> = None;
    for &c in codes.iter().filter(|&&c| c > 0) {
        let t = CELL_CODES[(c - 1) as usize];
        if let Some(first) = global_type.filter(|&f| f != t) {
            return Err(MeshError::MixedCellTypes { first, other: t });
        }
        global_type = Some(t);
    }
    let Some(cell_type) = global_type else {
        return Err(MeshError::EmptyCutMesh);
    };
    let gdim = gdims.iter().copied().max().unwrap_or(0) as usize;
    if local_type.is_none() {
        log::warn!("[rank {rank}] no cut fragments on this rank");
    }

    // 2. merge vertices, fragments in collection order
    let mut merger = VertexMerger::new(config.merge_tolerance.max(f64::MIN_POSITIVE));
    let mut x: Vec<f64> = Vec::new();
    let mut local_cells: Vec<usize> = Vec::new();
    let mut parents: Vec<i32> = Vec::new();
    for cc in &cut_cells.cut_cells {
        let stride = cc.gdim.max(1);
        let local_ids: Vec<usize> = cc
            .vertex_coords
            .chunks_exact(stride)
            .map(|p| {
                let mut q = [0.0; 3];
                q[..p.len()].copy_from_slice(p);
                let (id, fresh) = merger.insert(q);
                if fresh {
                    x.extend_from_slice(&q[..gdim]);
                }
                id
            })
            .collect();
        for (frag, &parent) in cc.connectivity.iter().zip(&cc.parent_cell_index) {
            local_cells.extend(frag.iter().map(|&v| local_ids[v]));
            parents.push(parent);
        }
    }
    let num_vertices = merger.points.len();
    let vertex_offset = exclusive_scan_sum(comm, num_vertices as u64)? as i64;
    let cells: Vec<i64> = local_cells
        .iter()
        .map(|&v| vertex_offset + v as i64)
        .collect();
    log::debug!(
        "[rank {rank}] cut mesh: {} fragments, {num_vertices} merged vertices",
        parents.len()
    );

    // 3. mesh, then align parents with the final cell order
    let element = CoordinateElement::new(cell_type, 1)?;
    let (mesh, order) = build_mesh(comm, &cells, element, &x, (num_vertices, gdim), config)?;
    let parent_map = order.iter().map(|&old| parents[old]).collect();
    Ok((mesh, parent_map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    fn unit_square_mesh(reorder: bool) -> Mesh<NoComm> {
        let cells = [0, 1, 3, 0, 2, 3];
        let x = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let el = CoordinateElement::new(CellType::Triangle, 1).unwrap();
        let cfg = MeshConfig {
            reorder_cells: reorder,
            ..Default::default()
        };
        create_mesh(&NoComm, &cells, el, &x, (4, 2), &cfg).unwrap()
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = MeshConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: MeshConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn stride_error_before_any_exchange() {
        let el = CoordinateElement::new(CellType::Triangle, 1).unwrap();
        let err = create_mesh(&NoComm, &[0, 1], el, &[0.0; 4], (2, 2), &MeshConfig::default())
            .unwrap_err();
        assert_eq!(err, MeshError::ConnectivityStride { len: 2, stride: 3 });
    }

    #[test]
    fn two_triangles() {
        let mesh = unit_square_mesh(false);
        assert_eq!(mesh.num_cells(), 2);
        assert_eq!(mesh.topology().index_map(0).unwrap().size_local(), 4);
        assert_eq!(mesh.cell_coordinates(0)[3..6], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn quadratic_geometry_creates_edges() {
        // one P2 triangle: vertices 0..3, edge midpoints 3..6
        let cells = [0, 1, 2, 3, 4, 5];
        let x = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.5, 0.5, 0.0, 0.5, 0.5, 0.0];
        let el = CoordinateElement::new(CellType::Triangle, 2).unwrap();
        let mesh = create_mesh(&NoComm, &cells, el, &x, (6, 2), &MeshConfig::default()).unwrap();
        assert_eq!(mesh.topology().num_entities(1), Some(3));
        assert_eq!(mesh.geometry().dofmap().links(0).len(), 6);
    }

    #[test]
    fn cut_mesh_merges_shared_vertices() {
        let cc = CutCell {
            gdim: 2,
            tdim: 2,
            vertex_coords: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            connectivity: vec![vec![0, 1, 2], vec![3, 4, 5]],
            types: vec![CellType::Triangle; 2],
            parent_cell_index: vec![7, 9],
        };
        let cut = CutCells {
            cut_cells: vec![cc],
            parent_map: vec![7],
        };
        let (mesh, parents) = create_cut_mesh(&NoComm, &cut, &MeshConfig::default()).unwrap();
        assert_eq!(mesh.topology().index_map(0).unwrap().size_global(), 4);
        assert_eq!(parents.len(), mesh.num_cells());
        let mut sorted = parents.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![7, 9]);
    }

    fn intervals(coords: Vec<f64>, connectivity: Vec<Vec<usize>>) -> CutCells {
        let n = connectivity.len();
        CutCells {
            cut_cells: vec![CutCell {
                gdim: 1,
                tdim: 1,
                vertex_coords: coords,
                connectivity,
                types: vec![CellType::Interval; n],
                parent_cell_index: (0..n as i32).collect(),
            }],
            parent_map: vec![0],
        }
    }

    #[test]
    fn cut_mesh_merges_within_tolerance_across_box_edges() {
        let tol = 1e-10;
        let cfg = MeshConfig {
            merge_tolerance: tol,
            ..Default::default()
        };
        // pairs straddling a box centre and a box edge, both closer than tol
        for (a, b) in [(0.499 * tol, 0.501 * tol), (0.999 * tol, 1.001 * tol), (-1e-13, 1e-13)] {
            let cut = intervals(vec![-1.0, a, b, 1.0], vec![vec![0, 1], vec![2, 3]]);
            let (mesh, _) = create_cut_mesh(&NoComm, &cut, &cfg).unwrap();
            assert_eq!(mesh.topology().index_map(0).unwrap().size_global(), 3, "a={a} b={b}");
        }
        let cut = intervals(vec![-1.0, 0.0, 1.5 * tol, 1.0], vec![vec![0, 1], vec![2, 3]]);
        let (mesh, _) = create_cut_mesh(&NoComm, &cut, &cfg).unwrap();
        assert_eq!(mesh.topology().index_map(0).unwrap().size_global(), 4);
    }

    #[test]
    fn malformed_fragments_are_rejected() {
        let tri = |coords: Vec<f64>, conn: Vec<Vec<usize>>, parents: Vec<i32>| CutCells {
            cut_cells: vec![CutCell {
                gdim: 2,
                tdim: 2,
                vertex_coords: coords,
                types: vec![CellType::Triangle; conn.len()],
                connectivity: conn,
                parent_cell_index: parents,
            }],
            parent_map: vec![0],
        };
        let unit = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
        let cfg = MeshConfig::default();

        let bad_index = tri(unit.clone(), vec![vec![0, 1, 3]], vec![0]);
        assert_eq!(
            create_cut_mesh(&NoComm, &bad_index, &cfg).unwrap_err(),
            MeshError::InvalidIndex { index: 3, size: 3 }
        );

        let ragged = tri(vec![0.0, 0.0, 1.0, 0.0, 0.0], vec![vec![0, 1, 2]], vec![0]);
        assert!(matches!(
            create_cut_mesh(&NoComm, &ragged, &cfg).unwrap_err(),
            MeshError::CoordinateShape { len: 5, .. }
        ));

        let short_parents = tri(unit.clone(), vec![vec![0, 1, 2], vec![0, 1, 2]], vec![0]);
        assert!(matches!(
            create_cut_mesh(&NoComm, &short_parents, &cfg).unwrap_err(),
            MeshError::ValueLength { expected: 2, found: 1, .. }
        ));

        let short_fragment = tri(unit, vec![vec![0, 1]], vec![0]);
        assert_eq!(
            create_cut_mesh(&NoComm, &short_fragment, &cfg).unwrap_err(),
            MeshError::ConnectivityStride { len: 2, stride: 3 }
        );
    }

    #[test]
    fn empty_cut_collection_is_an_error() {
        let cut = CutCells::default();
        let err = create_cut_mesh(&NoComm, &cut, &MeshConfig::default()).unwrap_err();
        assert_eq!(err, MeshError::EmptyCutMesh);
    }
}
