//! On-demand creation of edges and facets, and entity permutation data.

use crate::algs::communicator::Communicator;
use crate::algs::exchange::{agree, all_to_all_v, exclusive_scan_sum, tags};
use crate::algs::wire::WireKeyedId;
use crate::mesh_error::MeshError;
use crate::topology::adjacency::AdjacencyList;
use crate::topology::cell_type::CellType;
use crate::topology::distributed::Topology;
use crate::topology::index_map::IndexMap;
use crate::topology::reconcile::reconcile_ownership;
use hashbrown::HashMap;

struct LocalEntity {
    key: Vec<i64>,
    vertices: Vec<usize>,
    in_owned_cell: bool,
    in_ghost_cell: bool,
}

impl Topology {
    /// Collective: create the entities of dimension `dim` and the
    /// connectivities `(dim, 0)` and `(tdim, dim)`.
    ///
    /// Returns `false` when they already existed (vertices and cells always
    /// do). Entities are identified by their sorted global vertex ids; those
    /// that can be seen by other ranks are reconciled like vertices, the
    /// lowest rank holding one in an owned cell owning it.
    pub fn create_entities<C: Communicator>(
        &mut self,
        comm: &C,
        dim: usize,
    ) -> Result<bool, MeshError> {
        let tdim = self.dim();
        if dim > tdim {
            return Err(MeshError::InvalidIndex {
                index: dim,
                size: tdim + 1,
            });
        }
        if self.index_maps[dim].is_some() {
            return Ok(false);
        }
        let rank = comm.rank();
        let size = comm.size();
        let (Some(vmap), Some(cmap), Some(c2v)) = (
            self.index_maps[0].as_ref(),
            self.index_maps[tdim].as_ref(),
            self.connectivity.get(&(tdim, 0)),
        ) else {
            return Err(MeshError::MissingEntities(0));
        };
        let vglobal = vmap.global_indices();
        let mut interprocess = vec![false; vmap.size_total()];
        for flag in &mut interprocess[vmap.size_local()..] {
            *flag = true;
        }
        for (v, _) in vmap.shared() {
            interprocess[*v] = true;
        }

        // 1. local discovery in cell order
        let mut lookup: HashMap<Vec<i64>, usize> = HashMap::new();
        let mut found: Vec<LocalEntity> = Vec::new();
        let per_cell = self.cell_type.num_sub_entities(dim);
        let mut cell_entities = Vec::with_capacity(c2v.num_nodes() * per_cell);
        for c in 0..c2v.num_nodes() {
            let verts = c2v.links(c);
            let owned_cell = c < cmap.size_local();
            for local in self.cell_type.sub_entities(dim) {
                let mut ev: Vec<usize> = local.iter().map(|&i| verts[i]).collect();
                ev.sort_unstable_by_key(|&v| vglobal[v]);
                let key: Vec<i64> = ev.iter().map(|&v| vglobal[v]).collect();
                let idx = *lookup.entry(key.clone()).or_insert_with(|| {
                    found.push(LocalEntity {
                        key,
                        vertices: ev,
                        in_owned_cell: false,
                        in_ghost_cell: false,
                    });
                    found.len() - 1
                });
                found[idx].in_owned_cell |= owned_cell;
                found[idx].in_ghost_cell |= !owned_cell;
                cell_entities.push(idx);
            }
        }

        // 2. reconcile entities other ranks may hold
        let candidates: Vec<usize> = (0..found.len())
            .filter(|&i| {
                found[i].in_ghost_cell || found[i].vertices.iter().all(|&v| interprocess[v])
            })
            .collect();
        let keys: Vec<Vec<i64>> = candidates.iter().map(|&i| found[i].key.clone()).collect();
        let claims: Vec<bool> = candidates.iter().map(|&i| found[i].in_owned_cell).collect();
        let shared = reconcile_ownership(comm, &keys, &claims)?;
        let mut owner = vec![rank; found.len()];
        for (&i, s) in candidates.iter().zip(&shared) {
            owner[i] = s.owner;
        }

        // 3. owned first, then ghosts, each in order of discovery
        let (owned, ghosts): (Vec<usize>, Vec<usize>) =
            (0..found.len()).partition(|&i| owner[i] == rank);
        let offset = exclusive_scan_sum(comm, owned.len() as u64)? as i64;
        let mut local_index = vec![0usize; found.len()];
        for (pos, &i) in owned.iter().chain(&ghosts).enumerate() {
            local_index[i] = pos;
        }
        let mut send: Vec<Vec<WireKeyedId>> = vec![Vec::new(); size];
        for (&i, s) in candidates.iter().zip(&shared).filter(|(_, s)| s.owner == rank) {
            let id = offset + local_index[i] as i64;
            for &r in s.sharers.iter().filter(|&&r| r != rank) {
                send[r].push(WireKeyedId::new(&found[i].key, id));
            }
        }
        let mut received: HashMap<Vec<i64>, i64> = HashMap::new();
        for recs in all_to_all_v(comm, tags::GLOBAL_IDS, send)? {
            received.extend(recs.iter().map(|r| (r.key.decode(), r.index())));
        }
        let ghost_globals: Result<Vec<i64>, MeshError> = ghosts
            .iter()
            .map(|&i| {
                received
                    .get(&found[i].key)
                    .copied()
                    .ok_or_else(|| MeshError::UnownedEntity(found[i].key.clone()))
            })
            .collect();
        let ghost_globals = agree(comm, ghost_globals, "entity numbering")?;
        let ghost_owners = ghosts.iter().map(|&i| owner[i]).collect();
        let map = IndexMap::with_range(
            comm,
            (offset, offset + owned.len() as i64),
            ghost_globals,
            ghost_owners,
        )?;

        // 4. connectivity
        let e2v = AdjacencyList::from_lists(
            owned
                .iter()
                .chain(&ghosts)
                .map(|&i| found[i].vertices.iter().copied()),
        );
        let c2e = AdjacencyList::regular(
            cell_entities.into_iter().map(|i| local_index[i]).collect(),
            per_cell,
        );
        log::debug!(
            "[rank {rank}] created {} owned + {} ghost entities of dimension {dim}",
            map.size_local(),
            map.num_ghosts()
        );
        self.index_maps[dim] = Some(map);
        self.connectivity.insert((dim, 0), e2v);
        self.connectivity.insert((tdim, dim), c2e);
        Ok(true)
    }

    /// Compute per-cell permutation info and facet permutations from the
    /// global vertex numbering.
    ///
    /// Cell bits: in 2-D one reflection bit per edge. In 3-D three bits per
    /// face at `3 * f` (reflection, then two rotation bits), followed by one
    /// reflection bit per edge. Facet codes are `2 * rotations + reflection`
    /// (3-D) or the edge reflection (2-D). Idempotent.
    pub fn create_entity_permutations(&mut self) -> Result<(), MeshError> {
        if self.cell_permutations.is_some() {
            return Ok(());
        }
        let tdim = self.dim();
        let (Some(vmap), Some(c2v)) = (self.index_maps[0].as_ref(), self.connectivity.get(&(tdim, 0)))
        else {
            return Err(MeshError::MissingEntities(0));
        };
        let vglobal = vmap.global_indices();
        let ct = self.cell_type;
        let num_facets = if tdim == 0 { 0 } else { ct.num_sub_entities(tdim - 1) };
        let mut cell_info = Vec::with_capacity(c2v.num_nodes());
        let mut facet_perms = Vec::with_capacity(c2v.num_nodes() * num_facets);
        for verts in c2v.iter() {
            let g: Vec<i64> = verts.iter().map(|&v| vglobal[v]).collect();
            let mut info = 0u32;
            match tdim {
                2 => {
                    for (e, ev) in ct.sub_entities(1).enumerate() {
                        let reflected = g[ev[0]] > g[ev[1]];
                        info |= u32::from(reflected) << e;
                        facet_perms.push(u8::from(reflected));
                    }
                }
                3 => {
                    for (f, fv) in ct.sub_entities(2).enumerate() {
                        let (rots, reflected) =
                            face_orientation(ct.sub_entity_type(2, f), fv, &g);
                        info |= (u32::from(reflected) | (rots << 1)) << (3 * f);
                        facet_perms.push((2 * rots + u32::from(reflected)) as u8);
                    }
                    let edge_offset = 3 * ct.num_sub_entities(2);
                    for (e, ev) in ct.sub_entities(1).enumerate() {
                        info |= u32::from(g[ev[0]] > g[ev[1]]) << (edge_offset + e);
                    }
                }
                _ => facet_perms.extend(std::iter::repeat_n(0u8, num_facets)),
            }
            cell_info.push(info);
        }
        self.cell_permutations = Some(cell_info);
        self.facet_permutations = Some(facet_perms);
        Ok(())
    }
}

/// Rotations bringing the lowest global vertex to the front, and whether
/// the face is then traversed against the reference direction.
fn face_orientation(face: CellType, local: &[usize], g: &[i64]) -> (u32, bool) {
    // cyclic vertex order; quadrilaterals are numbered in tensor order
    let cyclic: Vec<i64> = match face {
        CellType::Quadrilateral => [0, 1, 3, 2].iter().map(|&i| g[local[i]]).collect(),
        _ => local.iter().map(|&i| g[i]).collect(),
    };
    let n = cyclic.len();
    let rots = cyclic
        .iter()
        .enumerate()
        .min_by_key(|&(_, v)| *v)
        .map_or(0, |(i, _)| i);
    let next = cyclic[(rots + 1) % n];
    let prev = cyclic[(rots + n - 1) % n];
    (rots as u32, next > prev)
}

#[cfg(test)]
mod tests {
    use crate::algs::communicator::{NoComm, RayonComm};
    use crate::algs::communicator::Communicator;
    use crate::topology::cell_type::CellType;
    use crate::topology::distributed::{Topology, create_topology};

    fn square() -> Topology {
        create_topology(
            &NoComm,
            &[0, 1, 2, 1, 3, 2],
            &[0, 1],
            &[],
            CellType::Triangle,
            &[0, 1, 2, 3],
        )
        .unwrap()
    }

    #[test]
    fn edges_of_two_triangles() {
        let mut t = square();
        assert!(t.create_entities(&NoComm, 1).unwrap());
        assert!(!t.create_entities(&NoComm, 1).unwrap());
        assert_eq!(t.num_entities(1), Some(5));
        let c2e = t.connectivity(2, 1).unwrap();
        // the diagonal (1, 2) is edge 0 of cell 0 and edge 1 of cell 1
        assert_eq!(c2e.links(0)[0], c2e.links(1)[1]);
        let e2v = t.connectivity(1, 0).unwrap();
        assert_eq!(e2v.links(c2e.links(0)[0]), &[1, 2]);
    }

    #[test]
    fn tetrahedron_faces_and_edges() {
        let mut t = create_topology(&NoComm, &[0, 1, 2, 3], &[0], &[], CellType::Tetrahedron, &[0, 1, 2, 3])
            .unwrap();
        t.create_entities(&NoComm, 1).unwrap();
        t.create_entities(&NoComm, 2).unwrap();
        assert_eq!(t.num_entities(1), Some(6));
        assert_eq!(t.num_entities(2), Some(4));
    }

    #[test]
    fn reflection_bits_follow_global_vertex_order() {
        let mut t = square();
        t.create_entity_permutations().unwrap();
        let info = t.cell_permutation_info().unwrap();
        // cell 1 = (1, 3, 2): edge 0 is (3, 2) reflected, edge 1 is (1, 2), edge 2 is (1, 3)
        assert_eq!(info[1], 0b001);
        assert_eq!(info[0], 0);
        assert_eq!(t.facet_permutations().unwrap().len(), 6);
    }

    #[test]
    fn tetrahedron_face_rotation() {
        // vertices are numbered in order of first appearance, so the second
        // cell sees them in descending global order
        let mut t = create_topology(
            &NoComm,
            &[0, 1, 2, 3, 4, 3, 2, 1],
            &[0, 1],
            &[],
            CellType::Tetrahedron,
            &[0, 1, 2, 3, 4],
        )
        .unwrap();
        t.create_entity_permutations().unwrap();
        assert_eq!(t.cell_permutation_info().unwrap()[0], 0);
        let info = t.cell_permutation_info().unwrap()[1];
        // face 0 = local (1, 2, 3) = global (3, 2, 1): two rotations, reflected
        assert_eq!(info & 0b111, 0b101);
        assert_eq!(t.facet_permutations().unwrap()[4], 5);
    }

    #[test]
    fn shared_edge_gets_one_global_index() {
        let world = RayonComm::world(2);
        let out: Vec<(i64, i64)> = std::thread::scope(|s| {
            let hs: Vec<_> = world
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        let cells = if c.rank() == 0 { [0, 1, 2] } else { [1, 3, 2] };
                        let mut t = create_topology(
                            c,
                            &cells,
                            &[c.rank() as i64],
                            &[],
                            CellType::Triangle,
                            &cells,
                        )
                        .unwrap();
                        t.create_entities(c, 1).unwrap();
                        let map = t.index_map(1).unwrap();
                        // the shared edge is (1, 2): edge 0 of cell (0,1,2), edge 1 of (1,3,2)
                        let local = t.connectivity(2, 1).unwrap().links(0)[if c.rank() == 0 { 0 } else { 1 }];
                        (map.local_to_global(local), map.size_global())
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(out[0].0, out[1].0);
        assert_eq!(out[0].1, 5);
    }
}
