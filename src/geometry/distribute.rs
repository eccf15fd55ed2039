//! Global-index-keyed redistribution of row data (node coordinates).
//
// Rows are owned in contiguous blocks: rank r holds the rows with global
// index `offset_r .. offset_r + rows_r`, offsets from a prefix sum of the
// local row counts. A rank asks each owner for the rows it needs and gets
// them back in request order, so no index list travels twice.

use crate::algs::communicator::Communicator;
use crate::algs::exchange::{agree, all_gather_u64, all_to_all_v, tags};
use crate::algs::wire::{WireF64, WireI64};
use crate::mesh_error::MeshError;

/// Collective: fetch rows `indices` of the distributed `(rows, cols)` array
/// whose local block is `x`. Returns `indices.len() * cols` values in the
/// order of `indices`.
///
/// An index outside the global row range is [`MeshError::UnresolvedNode`]
/// on the requesting rank and a remote failure everywhere else.
pub fn distribute_data<C: Communicator>(
    comm: &C,
    indices: &[i64],
    x: &[f64],
    shape: (usize, usize),
) -> Result<Vec<f64>, MeshError> {
    let (rows, cols) = shape;
    let size = comm.size();
    let rank = comm.rank();
    let check = if x.len() != rows * cols {
        Err(MeshError::CoordinateShape {
            len: x.len(),
            rows,
            gdim: cols,
        })
    } else {
        Ok(())
    };
    agree(comm, check, "coordinate shape")?;

    let counts = all_gather_u64(comm, rows as u64)?;
    let mut starts = Vec::with_capacity(size + 1);
    starts.push(0i64);
    for c in &counts {
        starts.push(starts[starts.len() - 1] + *c as i64);
    }
    let total = starts[size];

    let owners: Result<Vec<usize>, MeshError> = indices
        .iter()
        .map(|&g| {
            if g < 0 || g >= total {
                Err(MeshError::UnresolvedNode(g))
            } else {
                Ok(starts.partition_point(|&s| s <= g) - 1)
            }
        })
        .collect();
    let owners = agree(comm, owners, "coordinate lookup")?;

    let mut requests: Vec<Vec<WireI64>> = vec![Vec::new(); size];
    for (&g, &o) in indices.iter().zip(&owners) {
        requests[o].push(WireI64::of(g));
    }
    let asked = all_to_all_v(comm, tags::COORDINATES, requests)?;

    let my_start = starts[rank];
    let mut failure = Ok(());
    let replies: Vec<Vec<WireF64>> = asked
        .iter()
        .map(|ids| {
            let mut out = Vec::with_capacity(ids.len() * cols);
            for g in ids.iter().map(WireI64::get) {
                let row = (g - my_start) as usize;
                match x.get(row * cols..(row + 1) * cols) {
                    Some(vals) => out.extend(vals.iter().map(|&v| WireF64::of(v))),
                    None => {
                        failure = Err(MeshError::UnresolvedNode(g));
                        out.extend(std::iter::repeat_n(WireF64::of(f64::NAN), cols));
                    }
                }
            }
            out
        })
        .collect();
    let answered = all_to_all_v(comm, tags::COORDINATE_REPLY, replies)?;
    agree(comm, failure, "coordinate reply")?;

    let mut cursor = vec![0usize; size];
    let mut out = Vec::with_capacity(indices.len() * cols);
    for &o in &owners {
        let row = answered[o]
            .get(cursor[o]..cursor[o] + cols)
            .ok_or(MeshError::WireLength {
                neighbor: o,
                expected: (cursor[o] + cols) * size_of::<WireF64>(),
                found: answered[o].len() * size_of::<WireF64>(),
            })?;
        out.extend(row.iter().map(WireF64::get));
        cursor[o] += cols;
    }
    log::trace!(
        "[rank {rank}] fetched {} coordinate rows",
        indices.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, RayonComm};

    #[test]
    fn serial_lookup_returns_rows_in_request_order() {
        let x = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5];
        let out = distribute_data(&NoComm, &[2, 0], &x, (3, 2)).unwrap();
        assert_eq!(out, vec![2.0, 2.5, 0.0, 0.5]);
    }

    #[test]
    fn out_of_range_index_is_unresolved() {
        let err = distribute_data(&NoComm, &[3], &[0.0; 3], (3, 1)).unwrap_err();
        assert_eq!(err, MeshError::UnresolvedNode(3));
    }

    #[test]
    fn shape_is_checked() {
        let err = distribute_data(&NoComm, &[0], &[0.0; 5], (3, 2)).unwrap_err();
        assert!(matches!(err, MeshError::CoordinateShape { len: 5, .. }));
    }

    #[test]
    fn rows_cross_ranks() {
        let world = RayonComm::world(2);
        let out: Vec<Vec<f64>> = std::thread::scope(|s| {
            let hs: Vec<_> = world
                .iter()
                .map(|c| {
                    s.spawn(move || {
                        // rank 0 holds rows 0..2, rank 1 holds rows 2..3
                        let (x, rows) = if c.rank() == 0 {
                            (vec![0.0, 1.0], 2)
                        } else {
                            (vec![2.0], 1)
                        };
                        let want = if c.rank() == 0 { vec![2, 1] } else { vec![0] };
                        distribute_data(c, &want, &x, (rows, 1)).unwrap()
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(out[0], vec![2.0, 1.0]);
        assert_eq!(out[1], vec![0.0]);
    }
}
