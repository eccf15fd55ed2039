//! Runtime quadrature on the cut parts of intersected cells.

use super::reference::make_quadrature;
use super::{QuadratureRule, QuadratureRules};
use crate::algs::communicator::Communicator;
use crate::fem::element::FiniteElement;
use crate::fem::function::Function;
use crate::level_set::cut::{CellCutter, CutCell, LinearCutter, cut_reference_entities_with, simplex_measure};
use crate::level_set::locate::{LevelSetConfig, locate_entities_with};
use crate::level_set::predicate::{CutTarget, Predicate};
use crate::mesh::Mesh;
use crate::mesh_error::MeshError;

/// Rules of degree `order` on the part of every intersected owned cell
/// selected by `predicate`, added to `rules`.
///
/// Cells whose cut is empty or degenerate get a zero-length rule.
pub fn runtime_quadrature<C: Communicator>(
    level_set: &Function<C>,
    predicate: &str,
    order: usize,
    rules: &mut QuadratureRules,
) -> Result<(), MeshError> {
    runtime_quadrature_with(
        &LinearCutter,
        level_set,
        &Predicate::parse(predicate)?,
        order,
        &LevelSetConfig::default(),
        rules,
    )
}

/// [`runtime_quadrature`] with an explicit cutter and tolerance.
pub fn runtime_quadrature_with<C: Communicator>(
    cutter: &dyn CellCutter,
    level_set: &Function<C>,
    predicate: &Predicate,
    order: usize,
    config: &LevelSetConfig,
    rules: &mut QuadratureRules,
) -> Result<(), MeshError> {
    let tdim = level_set.function_space().mesh().topology().dim();
    let cells = locate_entities_with(level_set, tdim, &Predicate::INTERFACE, false, config)?;
    let mut cut = Vec::with_capacity(cells.len());
    cut_reference_entities_with(cutter, level_set, &cells, tdim, predicate, true, &mut cut)?;
    let interface = predicate.cut_target() == CutTarget::Interface;
    for (&c, cc) in cells.iter().zip(&cut) {
        let normal = if interface {
            Some(reference_normal(&level_set.cell_vertex_values(c), tdim))
        } else {
            None
        };
        rules.insert(c, fragment_quadrature(cc, order, normal)?);
    }
    log::debug!(
        "[rank {}] runtime quadrature of order {order} on {} cut cells",
        level_set.function_space().mesh().comm().rank(),
        cells.len()
    );
    Ok(())
}

/// Unit gradient of the linear interpolant of `phi` on the reference simplex.
fn reference_normal(phi: &[f64], tdim: usize) -> [f64; 3] {
    let mut n = [0.0; 3];
    for k in 0..tdim {
        n[k] = phi[k + 1] - phi[0];
    }
    let len = n.iter().map(|v| v * v).sum::<f64>().sqrt();
    if len > 0.0 {
        n.iter_mut().for_each(|v| *v /= len);
    }
    n
}

/// One rule over all fragments of `cc`, in the coordinates the fragments
/// are given in. Fragments must be simplices; `normal`, when given, is
/// attached to every point.
pub fn fragment_quadrature(
    cc: &CutCell,
    order: usize,
    normal: Option<[f64; 3]>,
) -> Result<QuadratureRule, MeshError> {
    let gdim = cc.gdim;
    let mut rule = QuadratureRule::new(gdim, Vec::new(), Vec::new());
    for f in 0..cc.num_fragments() {
        let t = cc.types[f];
        if !t.is_simplex() {
            return Err(MeshError::UnsupportedElement(format!(
                "runtime quadrature on {t:?} fragments"
            )));
        }
        let v = cc.fragment(f);
        let k = t.dimension();
        let scale = simplex_measure(&v) * [1.0, 1.0, 2.0, 6.0][k];
        let reference = make_quadrature(t, order)?;
        for q in 0..reference.num_points() {
            let xi = reference.point(q);
            for d in 0..gdim {
                let x = v[0][d] + (0..k).map(|i| (v[i + 1][d] - v[0][d]) * xi[i]).sum::<f64>();
                rule.points.push(x);
            }
            rule.weights.push(reference.weights[q] * scale);
            if let Some(n) = normal {
                rule.normals.extend_from_slice(&n[..gdim]);
            }
        }
    }
    Ok(rule)
}

/// Physical coordinates (3 per point) of every rule point, cells ascending.
pub fn physical_points<C: Communicator>(
    rules: &QuadratureRules,
    mesh: &Mesh<C>,
) -> Result<Vec<f64>, MeshError> {
    let geometry = mesh.geometry();
    let cmap = FiniteElement::from_coordinate_element(geometry.cmap())?;
    let mut out = Vec::new();
    for (c, rule) in rules.iter() {
        if rule.is_empty() {
            continue;
        }
        let tab = cmap.tabulate(0, &rule.points)?;
        let nodes = geometry.dofmap().links(c);
        for q in 0..rule.num_points() {
            let mut x = [0.0; 3];
            for (&n, &phi) in nodes.iter().zip(tab.row(0, q)) {
                let xn = geometry.node(n);
                for k in 0..3 {
                    x[k] += phi * xn[k];
                }
            }
            out.extend(x);
        }
    }
    Ok(out)
}
