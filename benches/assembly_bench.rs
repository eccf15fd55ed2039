use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::sync::Arc;

use cutfem_sieve::algs::communicator::NoComm;
use cutfem_sieve::fem::{
    AssemblyOptions, FiniteElement, FormDefinition, Function, FunctionSpace, IntegralType,
    LagrangeKernel, Subdomains, assemble_scalar_with, create_cut_form, create_form,
};
use cutfem_sieve::mesh::MeshConfig;
use cutfem_sieve::mesh::generation::create_rectangle;
use cutfem_sieve::quadrature::{QuadratureRules, runtime_quadrature};
use cutfem_sieve::topology::CellType;

fn circle_level_set(n: usize) -> Function<NoComm> {
    let mesh = create_rectangle(
        &NoComm,
        [-1.0, -1.0],
        [1.0, 1.0],
        [n, n],
        CellType::Triangle,
        &MeshConfig::default(),
    )
    .unwrap();
    let p1 = FiniteElement::new(CellType::Triangle, 1).unwrap();
    let space = Arc::new(FunctionSpace::new(Arc::new(mesh), p1).unwrap());
    let mut phi = Function::new(space);
    phi.interpolate(|x| (x[0] * x[0] + x[1] * x[1]).sqrt() - 0.5).unwrap();
    phi
}

fn bench_runtime_quadrature(c: &mut Criterion) {
    let mut group = c.benchmark_group("runtime_quadrature");
    for &n in &[16usize, 64] {
        let phi = circle_level_set(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &phi, |b, phi| {
            b.iter(|| {
                let mut rules = QuadratureRules::new();
                runtime_quadrature(phi, "phi<0", 3, &mut rules).unwrap();
                rules
            })
        });
    }
    group.finish();
}

fn bench_cut_area(c: &mut Criterion) {
    let mut group = c.benchmark_group("assemble_cut_area");
    for &n in &[16usize, 64] {
        let phi = circle_level_set(n);
        let mesh = Arc::clone(phi.function_space().mesh());
        let p1 = FiniteElement::new(CellType::Triangle, 1).unwrap();
        let kernel = Arc::new(LagrangeKernel::constant_functional(p1, 3).unwrap());
        let definition = Arc::new(
            FormDefinition::new(0)
                .with_integral(IntegralType::CutCell, 0, kernel)
                .with_constants(["alpha"]),
        );
        let mut rules = QuadratureRules::new();
        runtime_quadrature(&phi, "phi<0", 3, &mut rules).unwrap();
        let form = create_form(Arc::clone(&definition), vec![], vec![], &[("alpha", 1.0)], vec![], mesh)
            .unwrap();
        let mut subdomains = Subdomains::new();
        subdomains.insert(IntegralType::CutCell, vec![(0, Arc::new(rules))]);
        let cut_form = create_cut_form(definition, Arc::new(form), subdomains).unwrap();
        for parallel in [false, true] {
            let opts = AssemblyOptions { parallel };
            let id = BenchmarkId::new(if parallel { "parallel" } else { "serial" }, n);
            group.bench_with_input(id, &cut_form, |b, f| {
                b.iter(|| assemble_scalar_with(f, &opts).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_runtime_quadrature, bench_cut_area);
criterion_main!(benches);
