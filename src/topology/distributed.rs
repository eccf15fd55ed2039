//! Distributed mesh topology: index maps and connectivity per dimension.
//!
//! [`create_topology`] is the one-shot collective that turns per-rank vertex
//! connectivity into a [`Topology`]. Every rank must call it, with the same
//! cell type; if any rank fails, all ranks return an error.
//!
//! Vertex ownership: a vertex touched only by this rank's owned cells and
//! not on the process boundary is owned here. Every other vertex (on an
//! unmatched facet, in a cell ghosted elsewhere, or only reachable through a
//! ghost cell) is reconciled through the postmasters of
//! [`crate::topology::reconcile`]: the lowest rank holding it in an owned
//! cell owns it.

use crate::algs::communicator::Communicator;
use crate::algs::exchange::{agree, all_to_all_v, exclusive_scan_sum, tags};
use crate::algs::wire::{WireI64, WireKeyedId};
use crate::mesh_error::MeshError;
use crate::topology::adjacency::AdjacencyList;
use crate::topology::cell_type::CellType;
use crate::topology::index_map::IndexMap;
use crate::topology::reconcile::reconcile_ownership;
use hashbrown::{HashMap, HashSet};

/// Distributed topology of a single-cell-type mesh.
#[derive(Clone, Debug)]
pub struct Topology {
    pub(crate) cell_type: CellType,
    pub(crate) index_maps: Vec<Option<IndexMap>>,
    pub(crate) connectivity: HashMap<(usize, usize), AdjacencyList<usize>>,
    pub(crate) original_cell_index: Vec<i64>,
    pub(crate) original_vertex_index: Vec<i64>,
    pub(crate) cell_permutations: Option<Vec<u32>>,
    pub(crate) facet_permutations: Option<Vec<u8>>,
}

impl Topology {
    /// Topological dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.cell_type.dimension()
    }

    #[inline]
    pub fn cell_type(&self) -> CellType {
        self.cell_type
    }

    /// Index map of dimension `dim`, `None` until those entities exist.
    pub fn index_map(&self, dim: usize) -> Option<&IndexMap> {
        self.index_maps.get(dim).and_then(Option::as_ref)
    }

    /// Connectivity `d0 -> d1` in local indices; `(d, 0)` and `(tdim, d)`
    /// exist for every created dimension `d`.
    pub fn connectivity(&self, d0: usize, d1: usize) -> Option<&AdjacencyList<usize>> {
        self.connectivity.get(&(d0, d1))
    }

    /// Owned plus ghost entities of dimension `dim`.
    pub fn num_entities(&self, dim: usize) -> Option<usize> {
        self.index_map(dim).map(IndexMap::size_total)
    }

    /// Input global index of each local cell (owned, then ghosts).
    pub fn original_cell_index(&self) -> &[i64] {
        &self.original_cell_index
    }

    /// Input global id of each local vertex (owned, then ghosts).
    pub fn original_vertex_index(&self) -> &[i64] {
        &self.original_vertex_index
    }

    /// Packed per-cell permutation bits, once created.
    pub fn cell_permutation_info(&self) -> Option<&[u32]> {
        self.cell_permutations.as_deref()
    }

    /// Per `(cell, local facet)` permutation codes, once created.
    pub fn facet_permutations(&self) -> Option<&[u8]> {
        self.facet_permutations.as_deref()
    }

    /// Vertices of local cell `c`, in reference order.
    pub fn cell_vertices(&self, c: usize) -> &[usize] {
        self.connectivity
            .get(&(self.dim(), 0))
            .map(|a| a.links(c))
            .unwrap_or(&[])
    }
}

/// Unique values in order of first appearance.
fn first_appearance<'a>(values: impl IntoIterator<Item = &'a i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    values.into_iter().copied().filter(|v| seen.insert(*v)).collect()
}

fn check_input(
    cells: &[i64],
    original_cell_index: &[i64],
    ghost_owners: &[usize],
    cell_type: CellType,
) -> Result<usize, MeshError> {
    let nv = cell_type.num_vertices();
    if cell_type == CellType::Point || cells.len() % nv != 0 {
        return Err(MeshError::ConnectivityStride {
            len: cells.len(),
            stride: nv,
        });
    }
    let num_cells = cells.len() / nv;
    if original_cell_index.len() != num_cells {
        return Err(MeshError::ValueLength {
            what: "original cell index",
            expected: num_cells,
            found: original_cell_index.len(),
        });
    }
    if ghost_owners.len() > num_cells {
        return Err(MeshError::GhostCount {
            ghosts: ghost_owners.len(),
            cells: num_cells,
        });
    }
    Ok(num_cells)
}

/// Collective: build the distributed topology.
///
/// * `cells` - vertex connectivity (input global vertex ids), owned cells
///   first, then ghost cells.
/// * `original_cell_index` - input global index of every cell.
/// * `ghost_owners` - owning rank of each ghost cell.
/// * `boundary_vertices` - vertices on facets left unmatched by the local
///   dual graph of the owned cells.
pub fn create_topology<C: Communicator>(
    comm: &C,
    cells: &[i64],
    original_cell_index: &[i64],
    ghost_owners: &[usize],
    cell_type: CellType,
    boundary_vertices: &[i64],
) -> Result<Topology, MeshError> {
    let rank = comm.rank();
    let size = comm.size();
    let num_cells = agree(
        comm,
        check_input(cells, original_cell_index, ghost_owners, cell_type),
        "topology input",
    )?;
    let nv = cell_type.num_vertices();
    let num_owned_cells = num_cells - ghost_owners.len();
    let (owned_cells, ghost_cells) = cells.split_at(num_owned_cells * nv);

    // 1. cell index map; ghost cells learn their global index from owners
    let cell_offset = exclusive_scan_sum(comm, num_owned_cells as u64)? as i64;
    let owned_lookup: HashMap<i64, usize> = original_cell_index[..num_owned_cells]
        .iter()
        .enumerate()
        .map(|(i, &o)| (o, i))
        .collect();
    let mut queries: Vec<Vec<WireI64>> = vec![Vec::new(); size];
    for (&o, &owner) in original_cell_index[num_owned_cells..].iter().zip(ghost_owners) {
        if owner < size {
            queries[owner].push(WireI64::of(o));
        }
    }
    let asked = all_to_all_v(comm, tags::GHOST_QUERY, queries)?;
    // -1 never leaves this exchange: it is turned into an error below
    let replies = asked
        .iter()
        .map(|q| {
            q.iter()
                .map(|o| {
                    WireI64::of(
                        owned_lookup
                            .get(&o.get())
                            .map_or(-1, |&l| cell_offset + l as i64),
                    )
                })
                .collect()
        })
        .collect();
    let answered = all_to_all_v(comm, tags::GHOST_REPLY, replies)?;
    let mut cursor = vec![0usize; size];
    let ghost_cell_globals: Result<Vec<i64>, MeshError> = original_cell_index[num_owned_cells..]
        .iter()
        .zip(ghost_owners)
        .map(|(&o, &owner)| {
            let g = answered
                .get(owner)
                .and_then(|a| a.get(cursor[owner]))
                .map(WireI64::get)
                .filter(|&g| g >= 0)
                .ok_or(MeshError::UnownedEntity(vec![o]))?;
            cursor[owner] += 1;
            Ok(g)
        })
        .collect();
    let ghost_cell_globals = agree(comm, ghost_cell_globals, "ghost cell numbering")?;
    let cell_map = IndexMap::with_range(
        comm,
        (cell_offset, cell_offset + num_owned_cells as i64),
        ghost_cell_globals,
        ghost_owners.to_vec(),
    )?;

    // 2. vertices needing reconciliation
    let owned_vertices = first_appearance(owned_cells);
    let owned_set: HashSet<i64> = owned_vertices.iter().copied().collect();
    let ghost_only: Vec<i64> = first_appearance(ghost_cells)
        .into_iter()
        .filter(|v| !owned_set.contains(v))
        .collect();
    let mut interprocess: HashSet<i64> = boundary_vertices.iter().copied().collect();
    for c in cell_map.shared().iter().map(|(c, _)| *c) {
        interprocess.extend(&owned_cells[c * nv..(c + 1) * nv]);
    }
    let mut keys: Vec<Vec<i64>> = Vec::new();
    let mut claims = Vec::new();
    for &v in owned_vertices.iter().filter(|v| interprocess.contains(*v)) {
        keys.push(vec![v]);
        claims.push(true);
    }
    for &v in &ghost_only {
        keys.push(vec![v]);
        claims.push(false);
    }
    let shared = reconcile_ownership(comm, &keys, &claims)?;
    let owner_of: HashMap<i64, usize> = keys
        .iter()
        .zip(&shared)
        .map(|(k, s)| (k[0], s.owner))
        .collect();

    // 3. number owned vertices, ghosts receive ids from their owners
    let is_owned = |v: &i64| owner_of.get(v).is_none_or(|&o| o == rank);
    let (owned, mut ghosts): (Vec<i64>, Vec<i64>) =
        owned_vertices.iter().copied().partition(|v| is_owned(v));
    ghosts.extend(&ghost_only);
    let vertex_offset = exclusive_scan_sum(comm, owned.len() as u64)? as i64;
    let mut new_id: HashMap<i64, i64> = owned
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, vertex_offset + i as i64))
        .collect();
    let mut send: Vec<Vec<WireKeyedId>> = vec![Vec::new(); size];
    for (k, s) in keys.iter().zip(&shared).filter(|(_, s)| s.owner == rank) {
        let Some(&id) = new_id.get(&k[0]) else {
            continue;
        };
        for &r in s.sharers.iter().filter(|&&r| r != rank) {
            send[r].push(WireKeyedId::new(k, id));
        }
    }
    for recs in all_to_all_v(comm, tags::GLOBAL_IDS, send)? {
        for rec in recs {
            if let Some(&v) = rec.key.decode().first() {
                new_id.insert(v, rec.index());
            }
        }
    }
    let ghost_globals: Result<Vec<i64>, MeshError> = ghosts
        .iter()
        .map(|v| new_id.get(v).copied().ok_or(MeshError::UnownedEntity(vec![*v])))
        .collect();
    let ghost_globals = agree(comm, ghost_globals, "vertex numbering")?;
    let ghost_vertex_owners = ghosts.iter().map(|v| owner_of.get(v).copied().unwrap_or(rank)).collect();
    let vertex_map = IndexMap::with_range(
        comm,
        (vertex_offset, vertex_offset + owned.len() as i64),
        ghost_globals,
        ghost_vertex_owners,
    )?;

    // 4. cell -> vertex in local indices
    let original_vertex_index: Vec<i64> = owned.into_iter().chain(ghosts).collect();
    let local_of: HashMap<i64, usize> = original_vertex_index
        .iter()
        .enumerate()
        .map(|(i, &v)| (v, i))
        .collect();
    let c2v = AdjacencyList::regular(cells.iter().map(|v| local_of[v]).collect(), nv);

    log::debug!(
        "[rank {rank}] topology: {} owned + {} ghost cells, {} owned + {} ghost vertices",
        cell_map.size_local(),
        cell_map.num_ghosts(),
        vertex_map.size_local(),
        vertex_map.num_ghosts()
    );

    let tdim = cell_type.dimension();
    let mut index_maps = vec![None; tdim + 1];
    index_maps[0] = Some(vertex_map);
    index_maps[tdim] = Some(cell_map);
    let mut connectivity = HashMap::new();
    connectivity.insert((tdim, 0), c2v);
    Ok(Topology {
        cell_type,
        index_maps,
        connectivity,
        original_cell_index: original_cell_index.to_vec(),
        original_vertex_index,
        cell_permutations: None,
        facet_permutations: None,
    })
}
