//! Structured P1 background meshes on intervals, rectangles and boxes.
//!
//! Cells and node rows are split in contiguous blocks over the ranks of the
//! communicator, so every generator is collective.

use super::{Mesh, MeshConfig, create_mesh};
use crate::algs::communicator::Communicator;
use crate::geometry::element::CoordinateElement;
use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;

/// Half-open block `[start, end)` of `total` items on `rank`.
fn block_range(total: usize, size: usize, rank: usize) -> (usize, usize) {
    let base = total / size;
    let rem = total % size;
    let start = rank * base + rank.min(rem);
    let len = base + usize::from(rank < rem);
    (start, start + len)
}

fn check_extent(lo: &[f64], hi: &[f64], n: &[usize]) -> Result<(), MeshError> {
    if n.contains(&0) {
        return Err(MeshError::DegenerateGeometry(format!(
            "structured mesh needs at least one cell per direction, got {n:?}"
        )));
    }
    if lo
        .iter()
        .zip(hi)
        .any(|(a, b)| b.partial_cmp(a) != Some(std::cmp::Ordering::Greater))
    {
        return Err(MeshError::DegenerateGeometry(format!(
            "empty extent {lo:?} .. {hi:?}"
        )));
    }
    Ok(())
}

fn node_rows<C: Communicator>(
    comm: &C,
    num_nodes: usize,
    coordinate: impl Fn(usize) -> Vec<f64>,
) -> (Vec<f64>, usize) {
    let (start, end) = block_range(num_nodes, comm.size(), comm.rank());
    let x = (start..end).flat_map(coordinate).collect();
    (x, end - start)
}

/// Collective: `n` intervals on `[a, b]`.
pub fn create_interval<C: Communicator + Clone>(
    comm: &C,
    n: usize,
    (a, b): (f64, f64),
    config: &MeshConfig,
) -> Result<Mesh<C>, MeshError> {
    check_extent(&[a], &[b], &[n])?;
    let h = (b - a) / n as f64;
    let (c0, c1) = block_range(n, comm.size(), comm.rank());
    let cells: Vec<i64> = (c0..c1).flat_map(|i| [i as i64, i as i64 + 1]).collect();
    let (x, rows) = node_rows(comm, n + 1, |i| vec![a + h * i as f64]);
    let element = CoordinateElement::new(CellType::Interval, 1)?;
    create_mesh(comm, &cells, element, &x, (rows, 1), config)
}

/// Collective: `n[0] x n[1]` rectangle on `[p0, p1]`, split into triangles
/// (two per square, along the `v0-v3` diagonal) or quadrilaterals.
pub fn create_rectangle<C: Communicator + Clone>(
    comm: &C,
    p0: [f64; 2],
    p1: [f64; 2],
    n: [usize; 2],
    cell_type: CellType,
    config: &MeshConfig,
) -> Result<Mesh<C>, MeshError> {
    if !matches!(cell_type, CellType::Triangle | CellType::Quadrilateral) {
        return Err(MeshError::UnsupportedElement(format!(
            "rectangle mesh of {cell_type:?}"
        )));
    }
    check_extent(&p0, &p1, &n)?;
    let [nx, ny] = n;
    let hx = (p1[0] - p0[0]) / nx as f64;
    let hy = (p1[1] - p0[1]) / ny as f64;
    let vid = |i: usize, j: usize| (j * (nx + 1) + i) as i64;

    let (c0, c1) = block_range(nx * ny, comm.size(), comm.rank());
    let mut cells = Vec::new();
    for q in c0..c1 {
        let (i, j) = (q % nx, q / nx);
        let v = [vid(i, j), vid(i + 1, j), vid(i, j + 1), vid(i + 1, j + 1)];
        match cell_type {
            CellType::Triangle => cells.extend([v[0], v[1], v[3], v[0], v[2], v[3]]),
            _ => cells.extend(v),
        }
    }
    let (x, rows) = node_rows(comm, (nx + 1) * (ny + 1), |id| {
        let (i, j) = (id % (nx + 1), id / (nx + 1));
        vec![p0[0] + hx * i as f64, p0[1] + hy * j as f64]
    });
    let element = CoordinateElement::new(cell_type, 1)?;
    create_mesh(comm, &cells, element, &x, (rows, 2), config)
}

/// Six tetrahedra per hexahedron, all sharing the `v0-v7` diagonal.
const HEX_TO_TETS: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 7, 5],
    [0, 5, 7, 4],
    [0, 3, 2, 7],
    [0, 6, 4, 7],
    [0, 2, 6, 7],
];

/// Collective: `n[0] x n[1] x n[2]` box on `[p0, p1]` of hexahedra or
/// tetrahedra.
pub fn create_box<C: Communicator + Clone>(
    comm: &C,
    p0: [f64; 3],
    p1: [f64; 3],
    n: [usize; 3],
    cell_type: CellType,
    config: &MeshConfig,
) -> Result<Mesh<C>, MeshError> {
    if !matches!(cell_type, CellType::Tetrahedron | CellType::Hexahedron) {
        return Err(MeshError::UnsupportedElement(format!(
            "box mesh of {cell_type:?}"
        )));
    }
    check_extent(&p0, &p1, &n)?;
    let [nx, ny, nz] = n;
    let h: Vec<f64> = (0..3).map(|d| (p1[d] - p0[d]) / n[d] as f64).collect();
    let vid = |i: usize, j: usize, k: usize| ((k * (ny + 1) + j) * (nx + 1) + i) as i64;

    let (c0, c1) = block_range(nx * ny * nz, comm.size(), comm.rank());
    let mut cells = Vec::new();
    for q in c0..c1 {
        let (i, j, k) = (q % nx, (q / nx) % ny, q / (nx * ny));
        let v: Vec<i64> = (0..8)
            .map(|b| vid(i + (b & 1), j + ((b >> 1) & 1), k + ((b >> 2) & 1)))
            .collect();
        match cell_type {
            CellType::Tetrahedron => {
                for tet in &HEX_TO_TETS {
                    cells.extend(tet.iter().map(|&l| v[l]));
                }
            }
            _ => cells.extend(v),
        }
    }
    let (x, rows) = node_rows(comm, (nx + 1) * (ny + 1) * (nz + 1), |id| {
        let (i, j, k) = (id % (nx + 1), (id / (nx + 1)) % (ny + 1), id / ((nx + 1) * (ny + 1)));
        vec![
            p0[0] + h[0] * i as f64,
            p0[1] + h[1] * j as f64,
            p0[2] + h[2] * k as f64,
        ]
    });
    let element = CoordinateElement::new(cell_type, 1)?;
    create_mesh(comm, &cells, element, &x, (rows, 3), config)
}
