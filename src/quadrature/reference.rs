//! Quadrature rules on reference cells.
//!
//! Gauss–Legendre on the unit interval, tensor products on quadrilaterals
//! and hexahedra, collapsed (Duffy) Gauss rules on triangles and tetrahedra.

use super::QuadratureRule;
use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;
use hashbrown::HashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::f64::consts::PI;
use std::sync::Arc;

type Rule1d = Arc<(Vec<f64>, Vec<f64>)>;

static GAUSS_LEGENDRE: Lazy<Mutex<HashMap<usize, Rule1d>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// `n`-point Gauss–Legendre rule on `[0, 1]`, exact for degree `2n - 1`.
pub fn gauss_legendre(n: usize) -> Rule1d {
    if let Some(rule) = GAUSS_LEGENDRE.lock().get(&n) {
        return Arc::clone(rule);
    }
    let rule = Arc::new(compute_gauss_legendre(n));
    GAUSS_LEGENDRE.lock().insert(n, Arc::clone(&rule));
    rule
}

fn compute_gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut pts = vec![0.0; n];
    let mut wts = vec![0.0; n];
    for i in 0..n.div_ceil(2) {
        // Newton on P_n from the Tricomi initial guess
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..100 {
            let (mut p0, mut p1) = (1.0, x);
            for k in 2..=n {
                let kf = k as f64;
                let p2 = ((2.0 * kf - 1.0) * x * p1 - (kf - 1.0) * p0) / kf;
                p0 = p1;
                p1 = p2;
            }
            // p1 = P_n, p0 = P_{n-1}
            dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
            let dx = p1 / dp;
            x -= dx;
            if dx.abs() < 1e-16 {
                break;
            }
        }
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        // map [-1, 1] to [0, 1]
        pts[i] = 0.5 * (1.0 - x);
        pts[n - 1 - i] = 0.5 * (1.0 + x);
        wts[i] = 0.5 * w;
        wts[n - 1 - i] = 0.5 * w;
    }
    (pts, wts)
}

/// Points per direction for a 1-D Gauss rule exact to `degree`.
fn points_for(degree: usize) -> usize {
    degree / 2 + 1
}

/// A rule on `cell_type` exact for polynomials of degree `order`.
pub fn make_quadrature(cell_type: CellType, order: usize) -> Result<QuadratureRule, MeshError> {
    let mut points = Vec::new();
    let mut weights = Vec::new();
    match cell_type {
        CellType::Point => weights.push(1.0),
        CellType::Interval => {
            let g = gauss_legendre(points_for(order));
            points.extend_from_slice(&g.0);
            weights.extend_from_slice(&g.1);
        }
        CellType::Quadrilateral => {
            let g = gauss_legendre(points_for(order));
            for (&y, &wy) in g.0.iter().zip(&g.1) {
                for (&x, &wx) in g.0.iter().zip(&g.1) {
                    points.extend([x, y]);
                    weights.push(wx * wy);
                }
            }
        }
        CellType::Hexahedron => {
            let g = gauss_legendre(points_for(order));
            for (&z, &wz) in g.0.iter().zip(&g.1) {
                for (&y, &wy) in g.0.iter().zip(&g.1) {
                    for (&x, &wx) in g.0.iter().zip(&g.1) {
                        points.extend([x, y, z]);
                        weights.push(wx * wy * wz);
                    }
                }
            }
        }
        CellType::Triangle => {
            // (u, v) -> (u (1 - v), v), Jacobian 1 - v
            let g = gauss_legendre(points_for(order + 1));
            for (&v, &wv) in g.0.iter().zip(&g.1) {
                for (&u, &wu) in g.0.iter().zip(&g.1) {
                    points.extend([u * (1.0 - v), v]);
                    weights.push(wu * wv * (1.0 - v));
                }
            }
        }
        CellType::Tetrahedron => {
            let g = gauss_legendre(points_for(order + 2));
            for (&w, &ww) in g.0.iter().zip(&g.1) {
                for (&v, &wv) in g.0.iter().zip(&g.1) {
                    for (&u, &wu) in g.0.iter().zip(&g.1) {
                        points.extend([u * (1.0 - v) * (1.0 - w), v * (1.0 - w), w]);
                        weights.push(wu * wv * ww * (1.0 - v) * (1.0 - w) * (1.0 - w));
                    }
                }
            }
        }
        CellType::Prism => {
            return Err(MeshError::UnsupportedElement(
                "quadrature on prisms".to_string(),
            ));
        }
    }
    Ok(QuadratureRule::new(cell_type.dimension(), points, weights))
}
