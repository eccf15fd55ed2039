#![allow(dead_code)]
use cutfem_sieve::algs::communicator::{Communicator, NoComm, RayonComm};
use cutfem_sieve::fem::{FiniteElement, Function, FunctionSpace};
use cutfem_sieve::mesh::generation::create_rectangle;
use cutfem_sieve::mesh::{Mesh, MeshConfig};
use cutfem_sieve::topology::CellType;
use std::sync::Arc;

/// Run `f` on every rank of an `n`-rank thread world; results by rank.
pub fn spmd<R: Send>(n: usize, f: impl Fn(&RayonComm) -> R + Sync) -> Vec<R> {
    let world = RayonComm::world(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = world.iter().map(|c| s.spawn(|| f(c))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

pub fn p1() -> FiniteElement {
    FiniteElement::new(CellType::Triangle, 1).unwrap()
}

/// `[nx, ny]` triangles on `[-1, 1]^2`.
pub fn square<C: Communicator + Clone>(comm: &C, n: usize, config: &MeshConfig) -> Arc<Mesh<C>> {
    Arc::new(
        create_rectangle(comm, [-1.0, -1.0], [1.0, 1.0], [n, n], CellType::Triangle, config).unwrap(),
    )
}

/// P1 interpolant of `f` on `mesh`.
pub fn level_set<C: Communicator>(mesh: &Arc<Mesh<C>>, f: impl Fn([f64; 3]) -> f64) -> Function<C> {
    let space = Arc::new(FunctionSpace::new(Arc::clone(mesh), p1()).unwrap());
    let mut phi = Function::new(space);
    phi.interpolate(f).unwrap();
    phi
}

/// Signed distance to the circle of radius 0.5 about the origin.
pub fn circle(x: [f64; 3]) -> f64 {
    (x[0] * x[0] + x[1] * x[1]).sqrt() - 0.5
}

pub fn serial_square(n: usize) -> Arc<Mesh<NoComm>> {
    square(&NoComm, n, &MeshConfig::default())
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Clone + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
