mod util;
use util::*;

use cutfem_sieve::algs::communicator::{Communicator, NoComm};
use cutfem_sieve::fem::{
    assemble_scalar, assemble_scalar_with, create_cut_form, create_form, AssemblyOptions,
    CutForm, FormDefinition, IntegralType, LagrangeKernel, Subdomains, TabulateTensor,
};
use cutfem_sieve::level_set::{cut_reference_entities, locate_entities};
use cutfem_sieve::mesh::{Mesh, MeshConfig};
use cutfem_sieve::mesh_error::MeshError;
use cutfem_sieve::quadrature::{fragment_quadrature, runtime_quadrature, QuadratureRules};
use cutfem_sieve::topology::CellType;
use cutfem_sieve::fem::FiniteElement;
use std::f64::consts::PI;
use std::sync::Arc;

/// `∫ 1` over `phi < 0` (`surface == false`) or over `phi = 0`.
fn cut_functional<C: Communicator>(mesh: &Arc<Mesh<C>>, order: usize, surface: bool) -> CutForm<C> {
    let phi = level_set(mesh, circle);
    let volume: Arc<dyn TabulateTensor> = Arc::new(LagrangeKernel::constant_functional(p1(), order).unwrap());
    let interface: Arc<dyn TabulateTensor> = Arc::new(LagrangeKernel::interface_functional(p1()).unwrap());
    let definition = Arc::new(
        FormDefinition::new(0)
            .with_integral(IntegralType::Cell, 0, Arc::clone(&volume))
            .with_integral(IntegralType::CutCell, 0, volume)
            .with_integral(IntegralType::Interface, 0, interface)
            .with_constants(["alpha"]),
    );
    let mut subdomains = Subdomains::new();
    let domains = if surface {
        let mut rules = QuadratureRules::new();
        runtime_quadrature(&phi, "phi=0", order, &mut rules).unwrap();
        subdomains.insert(IntegralType::Interface, vec![(0, Arc::new(rules))]);
        vec![]
    } else {
        let mut rules = QuadratureRules::new();
        runtime_quadrature(&phi, "phi<0", order, &mut rules).unwrap();
        subdomains.insert(IntegralType::CutCell, vec![(0, Arc::new(rules))]);
        vec![(0, locate_entities(&phi, 2, "phi<0", false).unwrap())]
    };
    let form = create_form(
        Arc::clone(&definition),
        vec![],
        vec![],
        &[("alpha", 1.0)],
        domains,
        Arc::clone(mesh),
    )
    .unwrap();
    create_cut_form(definition, Arc::new(form), subdomains).unwrap()
}

#[test]
fn circle_area_converges() {
    let errors: Vec<f64> = [8, 16, 32]
        .iter()
        .map(|&n| {
            let area = assemble_scalar(&cut_functional(&serial_square(n), 2, false)).unwrap();
            (area - 0.25 * PI).abs()
        })
        .collect();
    assert!(errors[0] > errors[1] && errors[1] > errors[2], "{errors:?}");
    assert!(errors[2] < 5e-3, "{errors:?}");
}

#[test]
fn circle_perimeter_converges() {
    let errors: Vec<f64> = [8, 16, 32]
        .iter()
        .map(|&n| {
            let length = assemble_scalar(&cut_functional(&serial_square(n), 2, true)).unwrap();
            (length - PI).abs()
        })
        .collect();
    assert!(errors[0] > errors[1] && errors[1] > errors[2], "{errors:?}");
    assert!(errors[2] < 1e-2, "{errors:?}");
}

#[test]
fn runtime_path_reproduces_compiled_path() {
    let mesh = serial_square(5);
    let phi = level_set(&mesh, |x| -2.0 - x[0]);
    let kernel: Arc<dyn TabulateTensor> = Arc::new(LagrangeKernel::constant_functional(p1(), 2).unwrap());

    let compiled_def = Arc::new(
        FormDefinition::new(0)
            .with_integral(IntegralType::Cell, -1, Arc::clone(&kernel))
            .with_constants(["alpha"]),
    );
    let form = create_form(Arc::clone(&compiled_def), vec![], vec![], &[("alpha", 0.3)], vec![], Arc::clone(&mesh))
        .unwrap();
    let compiled = assemble_scalar(&create_cut_form(compiled_def, Arc::new(form), Subdomains::new()).unwrap())
        .unwrap();

    // every cell is inside: cutting returns the whole reference cell
    let cells: Vec<usize> = (0..mesh.num_cells()).collect();
    let mut cut = Vec::new();
    cut_reference_entities(&phi, &cells, 2, "phi<0", true, &mut cut).unwrap();
    let mut rules = QuadratureRules::new();
    for (&c, cc) in cells.iter().zip(&cut) {
        rules.insert(c, fragment_quadrature(cc, 2, None).unwrap());
    }
    let runtime_def = Arc::new(
        FormDefinition::new(0)
            .with_integral(IntegralType::CutCell, -1, kernel)
            .with_constants(["alpha"]),
    );
    let form = create_form(Arc::clone(&runtime_def), vec![], vec![], &[("alpha", 0.3)], vec![], Arc::clone(&mesh))
        .unwrap();
    let mut subdomains = Subdomains::new();
    subdomains.insert(IntegralType::CutCell, vec![(-1, Arc::new(rules))]);
    let runtime = assemble_scalar(&create_cut_form(runtime_def, Arc::new(form), subdomains).unwrap()).unwrap();

    assert_eq!(compiled.to_bits(), runtime.to_bits());
    assert!((compiled - 0.3 * 4.0).abs() < 1e-12);
}

#[test]
fn reordering_does_not_change_the_result() {
    let values: Vec<f64> = [false, true]
        .iter()
        .map(|&reorder| {
            let config = MeshConfig {
                reorder_cells: reorder,
                ..Default::default()
            };
            let mesh = square(&NoComm, 12, &config);
            assemble_scalar(&cut_functional(&mesh, 2, false)).unwrap()
        })
        .collect();
    assert!((values[0] - values[1]).abs() < 1e-13, "{values:?}");
}

#[test]
fn two_ranks_match_one_rank() {
    let serial = assemble_scalar(&cut_functional(&serial_square(10), 2, false)).unwrap();
    let out = spmd(2, |comm| {
        let mesh = square(comm, 10, &MeshConfig::default());
        assemble_scalar(&cut_functional(&mesh, 2, false)).unwrap()
    });
    assert_eq!(out[0].to_bits(), out[1].to_bits());
    assert!((out[0] - serial).abs() < 1e-13);
}

#[test]
fn parallel_option_gives_the_same_sum() {
    let form = cut_functional(&serial_square(10), 3, true);
    let a = assemble_scalar(&form).unwrap();
    let b = assemble_scalar_with(&form, &AssemblyOptions { parallel: true }).unwrap();
    assert_eq!(a.to_bits(), b.to_bits());
}

#[test]
fn hash_mismatch_fails_on_every_rank() {
    let out = spmd(2, |comm| {
        let mesh = square(comm, 4, &MeshConfig::default());
        let phi = level_set(&mesh, circle);
        // rank 1 was generated for quadrilaterals
        let element = if comm.rank() == 1 {
            FiniteElement::new(CellType::Quadrilateral, 1).unwrap()
        } else {
            p1()
        };
        let kernel = Arc::new(LagrangeKernel::constant_functional(element, 2).unwrap());
        let definition = Arc::new(
            FormDefinition::new(0)
                .with_integral(IntegralType::CutCell, 0, kernel)
                .with_constants(["alpha"]),
        );
        let mut rules = QuadratureRules::new();
        runtime_quadrature(&phi, "phi<0", 2, &mut rules).unwrap();
        let form = create_form(Arc::clone(&definition), vec![], vec![], &[("alpha", 1.0)], vec![], Arc::clone(&mesh))
            .unwrap();
        let mut subdomains = Subdomains::new();
        subdomains.insert(IntegralType::CutCell, vec![(0, Arc::new(rules))]);
        let cut_form = create_cut_form(definition, Arc::new(form), subdomains).unwrap();
        assemble_scalar(&cut_form)
    });
    assert_eq!(out[0], Err(MeshError::RemoteFailure("assemble_scalar")));
    assert!(matches!(out[1], Err(MeshError::ElementHashMismatch { integral: 0, slot: 0, .. })));
}
