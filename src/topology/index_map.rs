//! Global-to-local numbering of the entities of one dimension on one rank.
//!
//! Local indices `0..size_local()` are owned and carry the contiguous global
//! range `local_range()`; ghosts are appended after them. Every ghost
//! records its owning rank, and every owned entity that is ghosted elsewhere
//! records the ranks that ghost it (the forward scatter pattern).

use crate::algs::communicator::Communicator;
use crate::algs::exchange::{agree, all_gather_u64, all_to_all_v, exclusive_scan_sum, tags};
use crate::algs::wire::WireI64;
use crate::mesh_error::MeshError;
use hashbrown::HashMap;

#[derive(Clone, Debug)]
pub struct IndexMap {
    rank: usize,
    local_range: (i64, i64),
    size_global: i64,
    ghosts: Vec<i64>,
    owners: Vec<usize>,
    shared: Vec<(usize, Vec<usize>)>,
    ghost_lookup: HashMap<i64, usize>,
}

impl IndexMap {
    /// Collective: owned range from an exclusive prefix sum of `size_local`.
    pub fn new<C: Communicator>(
        comm: &C,
        size_local: usize,
        ghosts: Vec<i64>,
        owners: Vec<usize>,
    ) -> Result<Self, MeshError> {
        let offset = exclusive_scan_sum(comm, size_local as u64)? as i64;
        Self::with_range(comm, (offset, offset + size_local as i64), ghosts, owners)
    }

    /// Collective: build from an owned range the caller already computed.
    pub fn with_range<C: Communicator>(
        comm: &C,
        local_range: (i64, i64),
        ghosts: Vec<i64>,
        owners: Vec<usize>,
    ) -> Result<Self, MeshError> {
        let rank = comm.rank();
        let size = comm.size();
        let check = if ghosts.len() != owners.len() {
            Err(MeshError::ValueLength {
                what: "ghost owners",
                expected: ghosts.len(),
                found: owners.len(),
            })
        } else if let Some(&bad) = owners.iter().find(|&&o| o >= size || o == rank) {
            Err(MeshError::InvalidIndex { index: bad, size })
        } else {
            Ok(())
        };
        agree(comm, check, "index map ghosts")?;

        let totals = all_gather_u64(comm, (local_range.1 - local_range.0) as u64)?;
        let size_global = totals.iter().sum::<u64>() as i64;

        // tell owners who ghosts what
        let mut send: Vec<Vec<WireI64>> = vec![Vec::new(); size];
        for (&g, &o) in ghosts.iter().zip(&owners) {
            send[o].push(WireI64::of(g));
        }
        let recv = all_to_all_v(comm, tags::GHOST_QUERY, send)?;
        let mut sharers: Vec<Vec<usize>> = vec![Vec::new(); (local_range.1 - local_range.0) as usize];
        let mut bad = Ok(());
        for (src, ids) in recv.iter().enumerate() {
            for id in ids.iter().map(WireI64::get) {
                if id < local_range.0 || id >= local_range.1 {
                    bad = Err(MeshError::InvalidIndex {
                        index: id.max(0) as usize,
                        size: size_global as usize,
                    });
                    continue;
                }
                sharers[(id - local_range.0) as usize].push(src);
            }
        }
        agree(comm, bad, "index map shared entities")?;
        let shared = sharers
            .into_iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(i, mut s)| {
                s.sort_unstable();
                s.dedup();
                (i, s)
            })
            .collect();

        let ghost_lookup = ghosts.iter().enumerate().map(|(i, &g)| (g, i)).collect();
        Ok(Self {
            rank,
            local_range,
            size_global,
            ghosts,
            owners,
            shared,
            ghost_lookup,
        })
    }

    #[inline]
    pub fn size_local(&self) -> usize {
        (self.local_range.1 - self.local_range.0) as usize
    }

    #[inline]
    pub fn num_ghosts(&self) -> usize {
        self.ghosts.len()
    }

    /// Owned plus ghost entities.
    #[inline]
    pub fn size_total(&self) -> usize {
        self.size_local() + self.num_ghosts()
    }

    pub fn size_global(&self) -> i64 {
        self.size_global
    }

    pub fn local_range(&self) -> (i64, i64) {
        self.local_range
    }

    pub fn ghosts(&self) -> &[i64] {
        &self.ghosts
    }

    pub fn owners(&self) -> &[usize] {
        &self.owners
    }

    /// Owned local indices ghosted on other ranks, with those ranks.
    pub fn shared(&self) -> &[(usize, Vec<usize>)] {
        &self.shared
    }

    pub fn is_ghost(&self, local: usize) -> bool {
        local >= self.size_local()
    }

    pub fn owner(&self, local: usize) -> usize {
        match local.checked_sub(self.size_local()) {
            Some(g) => self.owners[g],
            None => self.rank,
        }
    }

    pub fn local_to_global(&self, local: usize) -> i64 {
        match local.checked_sub(self.size_local()) {
            Some(g) => self.ghosts[g],
            None => self.local_range.0 + local as i64,
        }
    }

    pub fn global_to_local(&self, global: i64) -> Option<usize> {
        if (self.local_range.0..self.local_range.1).contains(&global) {
            Some((global - self.local_range.0) as usize)
        } else {
            self.ghost_lookup.get(&global).map(|&g| self.size_local() + g)
        }
    }

    /// Global index of every local entity, owned first.
    pub fn global_indices(&self) -> Vec<i64> {
        (self.local_range.0..self.local_range.1)
            .chain(self.ghosts.iter().copied())
            .collect()
    }
}
