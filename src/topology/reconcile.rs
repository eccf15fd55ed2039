//! Ownership reconciliation of shared entities through postmaster ranks.
//
// Every entity that may live on several ranks is identified by a canonical
// key: its global vertex ids, sorted. The key is routed to a postmaster rank
// chosen from the key alone (`key[0] mod size`), so all ranks holding the
// same entity meet at the same postmaster without any prior coordination.
// The postmaster collects the ranks that reported the key and applies one
// rule: the lowest *claiming* rank owns it. Ranks that only need the entity
// (e.g. through a ghost cell) query without claiming.

use crate::algs::communicator::Communicator;
use crate::algs::exchange::{agree, all_to_all_v, tags};
use crate::algs::wire::{MAX_KEY_LEN, WireKey, WireOwnership, WireRank};
use crate::mesh_error::MeshError;
use hashbrown::HashMap;

/// A key's reconciled ownership as seen by one rank that reported it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedKey {
    /// Lowest claiming rank.
    pub owner: usize,
    /// Every rank that reported the key, ascending (includes the owner).
    pub sharers: Vec<usize>,
}

impl SharedKey {
    /// Reported by this rank alone.
    pub fn is_local(&self) -> bool {
        self.sharers.len() == 1
    }
}

/// Postmaster rank of a canonical key.
#[inline]
pub fn postmaster(key: &[i64], size: usize) -> usize {
    key.first()
        .map(|&v| v.rem_euclid(size as i64) as usize)
        .unwrap_or(0)
}

/// Collective: reconcile ownership of `keys` (each sorted, unique per rank).
///
/// `claims[i]` says whether this rank may own `keys[i]`. A key nobody claims
/// is an [`MeshError::UnownedEntity`] on every rank that reported it.
pub fn reconcile_ownership<C: Communicator>(
    comm: &C,
    keys: &[Vec<i64>],
    claims: &[bool],
) -> Result<Vec<SharedKey>, MeshError> {
    let size = comm.size();
    let me = comm.rank();

    let check = if keys.len() != claims.len() {
        Err(MeshError::ValueLength {
            what: "ownership claims",
            expected: keys.len(),
            found: claims.len(),
        })
    } else if let Some(k) = keys.iter().find(|k| k.is_empty() || k.len() > MAX_KEY_LEN) {
        Err(MeshError::ValueLength {
            what: "canonical key",
            expected: MAX_KEY_LEN,
            found: k.len(),
        })
    } else {
        Ok(())
    };
    agree(comm, check, "ownership keys")?;

    // 1. route keys to postmasters; the claim flag rides in a parallel bucket
    let mut send_keys: Vec<Vec<WireKey>> = vec![Vec::new(); size];
    let mut send_claims: Vec<Vec<WireRank>> = vec![Vec::new(); size];
    let mut slots = Vec::with_capacity(keys.len());
    for (key, &claim) in keys.iter().zip(claims) {
        let dest = postmaster(key, size);
        slots.push(dest);
        send_keys[dest].push(WireKey::new(key));
        send_claims[dest].push(WireRank::of(usize::from(claim)));
    }
    let recv_keys = all_to_all_v(comm, tags::RECONCILE, send_keys)?;
    let recv_claims = all_to_all_v(comm, tags::RECONCILE, send_claims)?;

    // 2. postmaster: holders and claimants per key
    let mut holders: HashMap<Vec<i64>, (Vec<usize>, Option<usize>)> = HashMap::new();
    for (src, (ks, cs)) in recv_keys.iter().zip(&recv_claims).enumerate() {
        for (k, c) in ks.iter().zip(cs) {
            let entry = holders.entry(k.decode()).or_default();
            entry.0.push(src);
            if c.get() != 0 {
                entry.1 = Some(entry.1.map_or(src, |o| o.min(src)));
            }
        }
    }
    for (ranks, _) in holders.values_mut() {
        ranks.sort_unstable();
        ranks.dedup();
    }

    // 3. reply in request order; a key nobody claims gets owner == size
    let mut reply_own: Vec<Vec<WireOwnership>> = vec![Vec::new(); size];
    let mut reply_sharers: Vec<Vec<WireRank>> = vec![Vec::new(); size];
    for (src, ks) in recv_keys.iter().enumerate() {
        for k in ks {
            let (ranks, owner) = holders
                .get(&k.decode())
                .map(|(r, o)| (r.as_slice(), *o))
                .unwrap_or((&[], None));
            reply_own[src].push(WireOwnership::new(owner.unwrap_or(size), ranks.len()));
            reply_sharers[src].extend(ranks.iter().map(|&r| WireRank::of(r)));
        }
    }
    let own = all_to_all_v(comm, tags::RECONCILE_REPLY, reply_own)?;
    let sharers = all_to_all_v(comm, tags::RECONCILE_SHARERS, reply_sharers)?;

    // 4. unpack; positions per postmaster advance in key order
    let mut next = vec![0usize; size];
    let mut cursor = vec![0usize; size];
    let mut out = Vec::with_capacity(keys.len());
    let mut failure = Ok(());
    for (key, &dest) in keys.iter().zip(&slots) {
        let Some(o) = own[dest].get(next[dest]) else {
            failure = Err(MeshError::CommError {
                neighbor: dest,
                source: "missing ownership reply".into(),
            });
            break;
        };
        next[dest] += 1;
        let n = o.num_sharers();
        let ranks: Vec<usize> = sharers[dest]
            .get(cursor[dest]..cursor[dest] + n)
            .map(|r| r.iter().map(WireRank::get).collect())
            .unwrap_or_default();
        cursor[dest] += n;
        if o.owner() >= size {
            failure = Err(MeshError::UnownedEntity(key.clone()));
        }
        out.push(SharedKey {
            owner: o.owner(),
            sharers: ranks,
        });
    }
    if me == 0 {
        log::trace!("reconciled {} keys", out.len());
    }
    agree(comm, failure.map(|_| out), "ownership reconciliation")
}

/// Collective: match the locally unmatched facets across ranks.
///
/// Returns, per facet, the other rank holding it, or `None` for a facet on
/// the physical boundary. A facet held by more than two ranks is an
/// [`MeshError::InconsistentSharedFacet`] on every rank.
pub fn match_shared_facets<C: Communicator>(
    comm: &C,
    facets: &[Vec<i64>],
) -> Result<Vec<Option<usize>>, MeshError> {
    let me = comm.rank();
    let shared = reconcile_ownership(comm, facets, &vec![true; facets.len()])?;
    let mut out = Vec::with_capacity(facets.len());
    let mut failure = Ok(());
    for (facet, s) in facets.iter().zip(&shared) {
        if s.sharers.len() > 2 {
            failure = Err(MeshError::InconsistentSharedFacet {
                vertices: facet.clone(),
                count: s.sharers.len(),
            });
        }
        out.push(s.sharers.iter().copied().find(|&r| r != me));
    }
    agree(comm, failure.map(|_| out), "shared facet matching")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, RayonComm};

    fn spmd<R: Send>(n: usize, f: impl Fn(&RayonComm) -> R + Sync) -> Vec<R> {
        let world = RayonComm::world(n);
        std::thread::scope(|s| {
            let hs: Vec<_> = world.iter().map(|c| s.spawn(|| f(c))).collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn serial_keys_are_local() {
        let out = reconcile_ownership(&NoComm, &[vec![3], vec![1, 2]], &[true, true]).unwrap();
        assert!(out.iter().all(|s| s.owner == 0 && s.is_local()));
    }

    #[test]
    fn lowest_claiming_rank_wins() {
        let out = spmd(3, |c| {
            // vertex 7 everywhere, only ranks 1 and 2 claim it
            reconcile_ownership(c, &[vec![7]], &[c.rank() != 0]).unwrap()
        });
        for r in &out {
            assert_eq!(r[0].owner, 1);
            assert_eq!(r[0].sharers, vec![0, 1, 2]);
        }
    }

    #[test]
    fn unclaimed_key_fails_everywhere() {
        let out = spmd(2, |c| {
            let keys = if c.rank() == 0 { vec![vec![4]] } else { vec![] };
            let claims = vec![false; keys.len()];
            reconcile_ownership(c, &keys, &claims)
        });
        assert_eq!(out[0], Err(MeshError::UnownedEntity(vec![4])));
        assert_eq!(out[1], Err(MeshError::RemoteFailure("ownership reconciliation")));
    }

    #[test]
    fn facet_on_three_ranks_is_inconsistent() {
        let out = spmd(3, |c| match_shared_facets(c, &[vec![1, 2]]));
        assert!(out.iter().all(|r| r.is_err()));
        assert!(out.iter().any(|r| matches!(
            r,
            Err(MeshError::InconsistentSharedFacet { count: 3, .. })
        )));
    }

    #[test]
    fn facets_pair_up_across_two_ranks() {
        let out = spmd(2, |c| {
            let facets = if c.rank() == 0 {
                vec![vec![0, 1], vec![1, 2]]
            } else {
                vec![vec![1, 2], vec![2, 3]]
            };
            match_shared_facets(c, &facets).unwrap()
        });
        assert_eq!(out[0], vec![None, Some(1)]);
        assert_eq!(out[1], vec![Some(0), None]);
    }
}
