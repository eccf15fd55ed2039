//! Collective operations built on the point-to-point [`Communicator`].
//!
//! Every collective here must be called by all ranks in the same order.
//! Each one exchanges a count header with every peer first and then the
//! payload (the two-stage pattern of size exchange followed by data
//! exchange). Send handles are always drained before returning, even on
//! error, so a failed rank never leaves half-posted messages behind.
//!
//! Results are deterministic: reductions combine per-rank contributions in
//! rank order, so every rank computes bit-identical values.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::{WireCount, WireF64, WireU64, cast_slice, collect_records};
use crate::mesh_error::MeshError;
use bytemuck::Pod;
use std::mem::size_of;

/// Tag bases per collective kind. Messages of one kind between a rank pair
/// are delivered in order, so reusing a tag across calls is safe.
pub mod tags {
    use super::CommTag;
    pub const ALL_TO_ALL: CommTag = CommTag::new(0xC100);
    pub const GATHER: CommTag = CommTag::new(0xC200);
    pub const RECONCILE: CommTag = CommTag::new(0xC300);
    pub const RECONCILE_REPLY: CommTag = CommTag::new(0xC310);
    pub const RECONCILE_SHARERS: CommTag = CommTag::new(0xC320);
    pub const GLOBAL_IDS: CommTag = CommTag::new(0xC400);
    pub const GHOST_QUERY: CommTag = CommTag::new(0xC500);
    pub const GHOST_REPLY: CommTag = CommTag::new(0xC510);
    pub const COORDINATES: CommTag = CommTag::new(0xC600);
    pub const COORDINATE_REPLY: CommTag = CommTag::new(0xC610);
}

/// Personalised all-to-all: `send[r]` goes to rank `r`; returns `recv[r]`,
/// the records rank `r` addressed to this rank.
pub fn all_to_all_v<T, C>(
    comm: &C,
    tag: CommTag,
    mut send: Vec<Vec<T>>,
) -> Result<Vec<Vec<T>>, MeshError>
where
    T: Pod,
    C: Communicator,
{
    let size = comm.size();
    let me = comm.rank();
    if send.len() != size {
        return Err(MeshError::ValueLength {
            what: "all-to-all send buckets",
            expected: size,
            found: send.len(),
        });
    }

    // 1) counts
    let mut count_recvs = Vec::with_capacity(size);
    for peer in (0..size).filter(|&p| p != me) {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            peer,
            tag.as_u16(),
            bytemuck::cast_slice_mut(std::slice::from_mut(&mut cnt)),
        );
        count_recvs.push((peer, h));
    }
    let mut pending_sends = Vec::with_capacity(2 * size);
    for peer in (0..size).filter(|&p| p != me) {
        let cnt = WireCount::new(send[peer].len());
        pending_sends.push(comm.isend(peer, tag.as_u16(), cast_slice(std::slice::from_ref(&cnt))));
    }
    let mut counts = vec![0usize; size];
    let mut maybe_err = None;
    for (peer, h) in count_recvs {
        match h.wait() {
            Some(data) if data.len() == size_of::<WireCount>() => {
                counts[peer] = collect_records::<WireCount>(&data)[0].get();
            }
            Some(data) => {
                maybe_err.get_or_insert(MeshError::WireLength {
                    neighbor: peer,
                    expected: size_of::<WireCount>(),
                    found: data.len(),
                });
            }
            None => {
                maybe_err.get_or_insert(MeshError::CommError {
                    neighbor: peer,
                    source: "failed to receive record count".into(),
                });
            }
        }
    }
    if let Some(err) = maybe_err {
        for s in pending_sends {
            let _ = s.wait();
        }
        return Err(err);
    }

    // 2) payloads; empty buckets are skipped on both sides
    let data_tag = tag.offset(1).as_u16();
    let mut data_recvs = Vec::with_capacity(size);
    for peer in (0..size).filter(|&p| p != me && counts[p] > 0) {
        let mut buf = vec![0u8; counts[peer] * size_of::<T>()];
        let h = comm.irecv(peer, data_tag, &mut buf);
        data_recvs.push((peer, h, buf.len()));
    }
    for peer in (0..size).filter(|&p| p != me && !send[p].is_empty()) {
        pending_sends.push(comm.isend(peer, data_tag, cast_slice(&send[peer])));
    }

    let mut recv: Vec<Vec<T>> = (0..size).map(|_| Vec::new()).collect();
    recv[me] = std::mem::take(&mut send[me]);
    for (peer, h, expected) in data_recvs {
        match h.wait() {
            Some(data) if data.len() == expected => recv[peer] = collect_records(&data),
            Some(data) => {
                maybe_err.get_or_insert(MeshError::WireLength {
                    neighbor: peer,
                    expected,
                    found: data.len(),
                });
            }
            None => {
                maybe_err.get_or_insert(MeshError::CommError {
                    neighbor: peer,
                    source: "failed to receive payload".into(),
                });
            }
        }
    }
    for s in pending_sends {
        let _ = s.wait();
    }
    match maybe_err {
        Some(err) => Err(err),
        None => Ok(recv),
    }
}

/// Gather one `u64` from every rank, indexed by rank.
pub fn all_gather_u64<C: Communicator>(comm: &C, value: u64) -> Result<Vec<u64>, MeshError> {
    let send = vec![vec![WireU64::of(value)]; comm.size()];
    let recv = all_to_all_v(comm, tags::GATHER, send)?;
    recv.iter()
        .enumerate()
        .map(|(peer, r)| {
            r.first().map(WireU64::get).ok_or(MeshError::CommError {
                neighbor: peer,
                source: "missing gathered value".into(),
            })
        })
        .collect()
}

/// Exclusive prefix sum over ranks (`MPI_Exscan` with `MPI_SUM`); rank 0
/// receives 0.
pub fn exclusive_scan_sum<C: Communicator>(comm: &C, value: u64) -> Result<u64, MeshError> {
    let all = all_gather_u64(comm, value)?;
    Ok(all[..comm.rank()].iter().sum())
}

/// Global sum of one `f64` per rank, combined in rank order.
pub fn all_reduce_sum<C: Communicator>(comm: &C, value: f64) -> Result<f64, MeshError> {
    let send = vec![vec![WireF64::of(value)]; comm.size()];
    let recv = all_to_all_v(comm, tags::GATHER, send)?;
    let mut total = 0.0;
    for (peer, r) in recv.iter().enumerate() {
        let v = r.first().ok_or(MeshError::CommError {
            neighbor: peer,
            source: "missing reduction operand".into(),
        })?;
        total += v.get();
    }
    Ok(total)
}

/// Global maximum of one `u64` per rank.
pub fn all_reduce_max<C: Communicator>(comm: &C, value: u64) -> Result<u64, MeshError> {
    Ok(all_gather_u64(comm, value)?.into_iter().max().unwrap_or(value))
}

/// Agree on success across ranks.
///
/// Every rank contributes whether its local step failed. A rank whose own
/// step failed returns its error; every other rank returns
/// [`MeshError::RemoteFailure`] if anyone failed. This keeps collectives
/// all-or-nothing: no rank proceeds to the next collective alone.
pub fn agree<T, C: Communicator>(
    comm: &C,
    local: Result<T, MeshError>,
    what: &'static str,
) -> Result<T, MeshError> {
    let failed = all_reduce_max(comm, u64::from(local.is_err()))?;
    match local {
        Err(err) => Err(err),
        Ok(_) if failed > 0 => Err(MeshError::RemoteFailure(what)),
        Ok(v) => Ok(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, RayonComm};
    use crate::algs::wire::WireI64;

    fn spmd<R: Send>(n: usize, f: impl Fn(&RayonComm) -> R + Sync) -> Vec<R> {
        let world = RayonComm::world(n);
        std::thread::scope(|s| {
            let handles: Vec<_> = world.iter().map(|c| s.spawn(|| f(c))).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn serial_collectives_are_identities() {
        let c = NoComm;
        assert_eq!(exclusive_scan_sum(&c, 5).unwrap(), 0);
        assert_eq!(all_reduce_sum(&c, 2.5).unwrap(), 2.5);
        let r = all_to_all_v(&c, tags::ALL_TO_ALL, vec![vec![WireI64::of(4)]]).unwrap();
        assert_eq!(r[0][0].get(), 4);
    }

    #[test]
    fn exscan_over_three_ranks() {
        let out = spmd(3, |c| exclusive_scan_sum(c, (c.rank() + 1) as u64).unwrap());
        assert_eq!(out, vec![0, 1, 3]);
    }

    #[test]
    fn all_to_all_routes_buckets() {
        let out = spmd(3, |c| {
            let send = (0..3)
                .map(|dst| {
                    (0..dst)
                        .map(|k| WireI64::of((10 * c.rank() + dst + k) as i64))
                        .collect()
                })
                .collect();
            let recv = all_to_all_v(c, tags::ALL_TO_ALL, send).unwrap();
            recv.iter()
                .map(|r| r.iter().map(WireI64::get).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        });
        // rank 2 receives two records from every rank
        assert_eq!(out[2], vec![vec![2, 3], vec![12, 13], vec![22, 23]]);
        assert!(out[0].iter().all(|r| r.is_empty()));
    }

    #[test]
    fn reductions_agree_on_all_ranks() {
        let out = spmd(4, |c| all_reduce_sum(c, 0.1 * c.rank() as f64).unwrap());
        assert!(out.windows(2).all(|w| w[0].to_bits() == w[1].to_bits()));
    }

    #[test]
    fn agree_propagates_a_single_failure() {
        let out = spmd(2, |c| {
            let local = if c.rank() == 1 {
                Err(MeshError::UnresolvedNode(7))
            } else {
                Ok(())
            };
            agree(c, local, "test")
        });
        assert_eq!(out[0], Err(MeshError::RemoteFailure("test")));
        assert_eq!(out[1], Err(MeshError::UnresolvedNode(7)));
    }
}
