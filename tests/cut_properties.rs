use cutfem_sieve::level_set::cut::simplex_measure;
use cutfem_sieve::level_set::{CellCutter, CutCell, LinearCutter, Predicate};
use cutfem_sieve::quadrature::fragment_quadrature;
use cutfem_sieve::topology::CellType;
use proptest::prelude::*;

const TRI: [f64; 6] = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0];
const TET: [f64; 12] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

fn measure(cc: &CutCell) -> f64 {
    (0..cc.num_fragments()).map(|f| simplex_measure(&cc.fragment(f))).sum()
}

fn cut(t: CellType, x: &[f64], phi: &[f64], p: &str) -> CutCell {
    let dim = t.dimension();
    LinearCutter
        .cut(t, x, dim, phi, &Predicate::parse(p).unwrap(), true)
        .unwrap()
}

fn level_values(n: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![-1.0f64..-0.01, 0.01f64..1.0],
        n,
    )
}

proptest! {
    #[test]
    fn triangle_sides_partition_the_cell(phi in level_values(3)) {
        let neg = measure(&cut(CellType::Triangle, &TRI, &phi, "phi<0"));
        let pos = measure(&cut(CellType::Triangle, &TRI, &phi, "phi>0"));
        prop_assert!((neg + pos - 0.5).abs() < 1e-12);
    }

    #[test]
    fn tetrahedron_sides_partition_the_cell(phi in level_values(4)) {
        let neg = measure(&cut(CellType::Tetrahedron, &TET, &phi, "phi<0"));
        let pos = measure(&cut(CellType::Tetrahedron, &TET, &phi, "phi>0"));
        prop_assert!((neg + pos - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn interface_points_lie_on_the_zero_set(phi in level_values(4)) {
        let cc = cut(CellType::Tetrahedron, &TET, &phi, "phi=0");
        let rule = fragment_quadrature(&cc, 2, Some([0.0, 0.0, 1.0])).unwrap();
        for q in 0..rule.num_points() {
            let x = rule.point(q);
            let value = phi[0] * (1.0 - x[0] - x[1] - x[2]) + phi[1] * x[0] + phi[2] * x[1] + phi[3] * x[2];
            prop_assert!(value.abs() < 1e-12);
        }
        let sum: f64 = rule.weights.iter().sum();
        prop_assert!((sum - measure(&cc)).abs() <= 1e-10 * measure(&cc).max(1e-300));
    }

    #[test]
    fn predicate_display_parses_back(bits in 1u8..8) {
        let mut p: Option<Predicate> = None;
        for (bit, q) in [(1, Predicate::INSIDE), (2, Predicate::INTERFACE), (4, Predicate::OUTSIDE)] {
            if bits & bit != 0 {
                p = Some(p.map_or(q, |p| p.union(q)));
            }
        }
        let p = p.unwrap();
        prop_assert_eq!(Predicate::parse(&p.to_string()).unwrap(), p);
    }
}
