mod util;
use util::*;

use cutfem_sieve::algs::communicator::NoComm;
use cutfem_sieve::level_set::{locate_entities, locate_entities_with, LevelSetConfig, Predicate};
use cutfem_sieve::mesh::MeshConfig;
use cutfem_sieve::quadrature::{runtime_quadrature, QuadratureRules};

#[test]
fn strictly_negative_level_set() {
    let mesh = serial_square(6);
    let phi = level_set(&mesh, |x| -1.0 - x[0] * x[0]);
    let n = mesh.num_cells();
    assert_eq!(locate_entities(&phi, 2, "phi<0", false).unwrap(), (0..n).collect::<Vec<_>>());
    assert!(locate_entities(&phi, 2, "phi=0", false).unwrap().is_empty());
    assert!(locate_entities(&phi, 2, "phi>0", false).unwrap().is_empty());
    assert_eq!(locate_entities(&phi, 0, "phi<0", true).unwrap().len(), 49);

    let mut rules = QuadratureRules::new();
    runtime_quadrature(&phi, "phi<0", 2, &mut rules).unwrap();
    assert!(rules.is_empty());
}

#[test]
fn single_interior_facet() {
    // one square, diagonal from (-1, -1) to (1, 1); phi vanishes on it and
    // changes sign across it only through the shared facet
    for reorder in [false, true] {
        let config = MeshConfig {
            reorder_cells: reorder,
            ..Default::default()
        };
        let mesh = square(&NoComm, 1, &config);
        let phi = level_set(&mesh, |x| x[0] - x[1]);
        assert_eq!(locate_entities(&phi, 2, "phi=0", false).unwrap(), vec![0, 1]);
    }
}

#[test]
fn tolerance_controls_the_interface_band() {
    let mesh = serial_square(2);
    let phi = level_set(&mesh, |x| x[0] - 1e-8);
    let tight = locate_entities_with(
        &phi,
        2,
        &Predicate::INTERFACE,
        false,
        &LevelSetConfig::default(),
    )
    .unwrap();
    let loose = locate_entities_with(
        &phi,
        2,
        &Predicate::INTERFACE,
        false,
        &LevelSetConfig { tolerance: 1e-6 },
    )
    .unwrap();
    // with a loose band every cell touching x = 0 counts as intersected
    assert!(loose.len() >= tight.len());
    assert!(tight.iter().all(|c| loose.contains(c)));
}

#[test]
fn predicates_combine_by_union() {
    let mesh = serial_square(4);
    let phi = level_set(&mesh, circle);
    let inside = locate_entities(&phi, 2, "phi<0", false).unwrap();
    let cut = locate_entities(&phi, 2, "phi=0", false).unwrap();
    let both = locate_entities(&phi, 2, "phi<0 or phi=0", false).unwrap();
    let mut want: Vec<usize> = inside.iter().chain(&cut).copied().collect();
    want.sort_unstable();
    assert_eq!(both, want);
    assert!(locate_entities(&phi, 2, "phi<>0", false).is_err());
}
