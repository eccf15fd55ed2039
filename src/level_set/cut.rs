//! Cutting cells by the zero level set.
//!
//! A [`CellCutter`] turns one cell plus its vertex level-set values into
//! fragments: the part on one side of the interface, or the interface
//! itself. [`LinearCutter`] handles simplices with a linear level set by
//! marching simplices; other cutters can be plugged in through the trait.

use super::locate::entity_vertices;
use super::predicate::{CutTarget, Predicate};
use crate::algs::communicator::Communicator;
use crate::fem::function::Function;
use crate::mesh_error::MeshError;
use crate::topology::cell_type::CellType;
use hashbrown::HashMap;
use std::cmp::Ordering;

/// Fragments cut from one cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CutCell {
    /// Components per vertex coordinate.
    pub gdim: usize,
    /// Dimension of the fragments.
    pub tdim: usize,
    /// Flattened `(num_vertices, gdim)` fragment vertices.
    pub vertex_coords: Vec<f64>,
    /// Vertex indices of every fragment.
    pub connectivity: Vec<Vec<usize>>,
    /// Shape of every fragment.
    pub types: Vec<CellType>,
    /// Background entity every fragment was cut from.
    pub parent_cell_index: Vec<i32>,
}

impl CutCell {
    pub fn num_fragments(&self) -> usize {
        self.connectivity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectivity.is_empty()
    }

    /// Vertex `v`, padded to three components.
    pub fn vertex(&self, v: usize) -> [f64; 3] {
        let mut p = [0.0; 3];
        p[..self.gdim].copy_from_slice(&self.vertex_coords[v * self.gdim..(v + 1) * self.gdim]);
        p
    }

    /// Vertices of fragment `f`.
    pub fn fragment(&self, f: usize) -> Vec<[f64; 3]> {
        self.connectivity[f].iter().map(|&v| self.vertex(v)).collect()
    }
}

/// A collection of cut cells and the parent entity of each.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CutCells {
    pub cut_cells: Vec<CutCell>,
    pub parent_map: Vec<i32>,
}

/// Produces fragments of a cell from vertex coordinates and level-set values.
pub trait CellCutter: Send + Sync {
    /// * `vertex_coordinates` - `(num_vertices, gdim)` flattened.
    /// * `level_set` - one value per vertex.
    /// * `triangulate` - split non-simplex fragments into simplices.
    fn cut(
        &self,
        cell_type: CellType,
        vertex_coordinates: &[f64],
        gdim: usize,
        level_set: &[f64],
        predicate: &Predicate,
        triangulate: bool,
    ) -> Result<CutCell, MeshError>;
}

/// Marching-simplex cutter for intervals, triangles and tetrahedra.
///
/// Vertices with `phi < 0` are on the negative side, all others on the
/// positive side. Edge crossings are computed from the endpoint with the
/// lexicographically smaller coordinates, so two cells sharing an edge
/// produce bit-identical crossing points. Fragments whose measure is below
/// `1e-12 h^k` (`h` the cell diameter, `k` the fragment dimension) are
/// dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct LinearCutter;

const PRISM_TO_TETS: [&[usize]; 3] = [&[0, 1, 2, 5], &[0, 1, 5, 4], &[0, 4, 5, 3]];
const QUAD_TO_TRIANGLES: [&[usize]; 2] = [&[0, 1, 2], &[1, 3, 2]];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Node {
    Vertex(usize),
    Crossing(usize, usize),
}

struct Builder<'a> {
    x: &'a [f64],
    gdim: usize,
    phi: &'a [f64],
    ids: HashMap<Node, usize>,
    out: CutCell,
}

impl<'a> Builder<'a> {
    fn coord(&self, v: usize) -> &'a [f64] {
        &self.x[v * self.gdim..(v + 1) * self.gdim]
    }

    fn node(&mut self, n: Node) -> usize {
        if let Some(&id) = self.ids.get(&n) {
            return id;
        }
        match n {
            Node::Vertex(v) => {
                let p = self.coord(v);
                self.out.vertex_coords.extend_from_slice(p);
            }
            Node::Crossing(a, b) => {
                let (pa, pb) = (self.coord(a), self.coord(b));
                let (i, j) = match pa.partial_cmp(pb) {
                    Some(Ordering::Greater) => (b, a),
                    _ => (a, b),
                };
                let t = self.phi[i] / (self.phi[i] - self.phi[j]);
                let (pi, pj) = (self.coord(i), self.coord(j));
                let p: Vec<f64> = pi.iter().zip(pj).map(|(u, w)| u + t * (w - u)).collect();
                self.out.vertex_coords.extend(p);
            }
        }
        let id = self.ids.len();
        self.ids.insert(n, id);
        id
    }

    fn push(&mut self, cell_type: CellType, nodes: &[Node], triangulate: bool) {
        let split: &[&[usize]] = match (cell_type, triangulate) {
            (CellType::Prism, true) => &PRISM_TO_TETS,
            (CellType::Quadrilateral, true) => &QUAD_TO_TRIANGLES,
            _ => {
                let ids: Vec<usize> = nodes.iter().map(|&n| self.node(n)).collect();
                self.out.connectivity.push(ids);
                self.out.types.push(cell_type);
                return;
            }
        };
        let simplex = if cell_type == CellType::Prism {
            CellType::Tetrahedron
        } else {
            CellType::Triangle
        };
        for local in split {
            let ids: Vec<usize> = local.iter().map(|&l| self.node(nodes[l])).collect();
            self.out.connectivity.push(ids);
            self.out.types.push(simplex);
        }
    }
}

/// Measure of the `k`-simplex with vertices `pts` (any ambient dimension).
pub fn simplex_measure(pts: &[[f64; 3]]) -> f64 {
    let k = pts.len().saturating_sub(1);
    if k == 0 {
        return 1.0;
    }
    let e: Vec<[f64; 3]> = pts[1..]
        .iter()
        .map(|p| [p[0] - pts[0][0], p[1] - pts[0][1], p[2] - pts[0][2]])
        .collect();
    let dot = |a: &[f64; 3], b: &[f64; 3]| a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
    let mut g = [[0.0; 3]; 3];
    for i in 0..k {
        for j in 0..k {
            g[i][j] = dot(&e[i], &e[j]);
        }
    }
    let det = match k {
        1 => g[0][0],
        2 => g[0][0] * g[1][1] - g[0][1] * g[1][0],
        _ => {
            g[0][0] * (g[1][1] * g[2][2] - g[1][2] * g[2][1])
                - g[0][1] * (g[1][0] * g[2][2] - g[1][2] * g[2][0])
                + g[0][2] * (g[1][0] * g[2][1] - g[1][1] * g[2][0])
        }
    };
    let fact = [1.0, 1.0, 2.0, 6.0][k];
    det.max(0.0).sqrt() / fact
}

fn fragment_measure(cc: &CutCell, f: usize) -> f64 {
    let pts = cc.fragment(f);
    match cc.types[f] {
        CellType::Quadrilateral | CellType::Prism => {
            let split: &[&[usize]] = if cc.types[f] == CellType::Prism {
                &PRISM_TO_TETS
            } else {
                &QUAD_TO_TRIANGLES
            };
            split
                .iter()
                .map(|t| simplex_measure(&t.iter().map(|&l| pts[l]).collect::<Vec<_>>()))
                .sum()
        }
        _ => simplex_measure(&pts),
    }
}

/// Drop fragments of negligible measure and the vertices only they used.
fn drop_degenerate(mut cc: CutCell, h: f64) -> CutCell {
    let keep: Vec<usize> = (0..cc.num_fragments())
        .filter(|&f| cc.tdim == 0 || fragment_measure(&cc, f) > 1e-12 * h.powi(cc.tdim as i32))
        .collect();
    if keep.len() == cc.num_fragments() {
        return cc;
    }
    log::warn!(
        "dropping {} degenerate fragment(s) of dimension {}",
        cc.num_fragments() - keep.len(),
        cc.tdim
    );
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let mut coords = Vec::new();
    let mut connectivity = Vec::with_capacity(keep.len());
    let mut types = Vec::with_capacity(keep.len());
    for &f in &keep {
        let ids = cc.connectivity[f]
            .iter()
            .map(|&v| {
                *remap.entry(v).or_insert_with(|| {
                    coords.extend_from_slice(&cc.vertex_coords[v * cc.gdim..(v + 1) * cc.gdim]);
                    coords.len() / cc.gdim - 1
                })
            })
            .collect();
        connectivity.push(ids);
        types.push(cc.types[f]);
    }
    cc.vertex_coords = coords;
    cc.connectivity = connectivity;
    cc.types = types;
    cc
}

impl CellCutter for LinearCutter {
    fn cut(
        &self,
        cell_type: CellType,
        vertex_coordinates: &[f64],
        gdim: usize,
        level_set: &[f64],
        predicate: &Predicate,
        triangulate: bool,
    ) -> Result<CutCell, MeshError> {
        if !cell_type.is_simplex() || cell_type == CellType::Point {
            return Err(MeshError::UnsupportedElement(format!(
                "linear cutting of {cell_type:?}"
            )));
        }
        let nv = cell_type.num_vertices();
        let tdim = cell_type.dimension();
        if gdim < tdim || vertex_coordinates.len() != nv * gdim {
            return Err(MeshError::CoordinateShape {
                len: vertex_coordinates.len(),
                rows: nv,
                gdim,
            });
        }
        if level_set.len() != nv {
            return Err(MeshError::ValueLength {
                what: "cell level-set values",
                expected: nv,
                found: level_set.len(),
            });
        }

        let target = predicate.cut_target();
        let frag_dim = if target == CutTarget::Interface { tdim - 1 } else { tdim };
        let mut b = Builder {
            x: vertex_coordinates,
            gdim,
            phi: level_set,
            ids: HashMap::new(),
            out: CutCell {
                gdim,
                tdim: frag_dim,
                ..Default::default()
            },
        };
        let neg: Vec<usize> = (0..nv).filter(|&i| level_set[i] < 0.0).collect();
        let pos: Vec<usize> = (0..nv).filter(|&i| level_set[i] >= 0.0).collect();
        let whole: Vec<Node> = (0..nv).map(Node::Vertex).collect();

        match target {
            CutTarget::Whole => b.push(cell_type, &whole, triangulate),
            CutTarget::Negative => one_side(&mut b, tdim, &neg, &pos, triangulate),
            CutTarget::Positive => one_side(&mut b, tdim, &pos, &neg, triangulate),
            CutTarget::Interface => interface(&mut b, tdim, &neg, &pos, triangulate),
        }

        let h = (0..nv)
            .flat_map(|i| (i + 1..nv).map(move |j| (i, j)))
            .map(|(i, j)| {
                b.coord(i)
                    .iter()
                    .zip(b.coord(j))
                    .map(|(u, w)| (u - w) * (u - w))
                    .sum::<f64>()
                    .sqrt()
            })
            .fold(0.0, f64::max);
        let out = drop_degenerate(b.out, h);
        log::trace!(
            "cut {cell_type:?} ({} negative vertices): {} fragment(s)",
            neg.len(),
            out.num_fragments()
        );
        Ok(out)
    }
}

fn cross(a: usize, b: usize) -> Node {
    Node::Crossing(a.min(b), a.max(b))
}

/// Part of the simplex spanned by `inn` after cutting away `out`.
fn one_side(b: &mut Builder<'_>, tdim: usize, inn: &[usize], out: &[usize], triangulate: bool) {
    use Node::Vertex as V;
    if inn.is_empty() {
        return;
    }
    if out.is_empty() {
        let all: Vec<Node> = inn.iter().map(|&v| V(v)).collect();
        let t = [CellType::Point, CellType::Interval, CellType::Triangle, CellType::Tetrahedron][tdim];
        b.push(t, &all, triangulate);
        return;
    }
    match (tdim, inn.len()) {
        (1, _) => b.push(CellType::Interval, &[V(inn[0]), cross(inn[0], out[0])], triangulate),
        (2, 1) => {
            let a = inn[0];
            b.push(
                CellType::Triangle,
                &[V(a), cross(a, out[0]), cross(a, out[1])],
                triangulate,
            );
        }
        (2, _) => {
            let (a, c, o) = (inn[0], inn[1], out[0]);
            b.push(
                CellType::Quadrilateral,
                &[V(a), V(c), cross(a, o), cross(c, o)],
                triangulate,
            );
        }
        (_, 1) => {
            let a = inn[0];
            let nodes = [V(a), cross(a, out[0]), cross(a, out[1]), cross(a, out[2])];
            b.push(CellType::Tetrahedron, &nodes, triangulate);
        }
        (_, 2) => {
            let (a, c) = (inn[0], inn[1]);
            let (o, p) = (out[0], out[1]);
            let nodes = [V(a), cross(a, o), cross(a, p), V(c), cross(c, o), cross(c, p)];
            b.push(CellType::Prism, &nodes, triangulate);
        }
        _ => {
            let o = out[0];
            let nodes = [
                V(inn[0]),
                V(inn[1]),
                V(inn[2]),
                cross(inn[0], o),
                cross(inn[1], o),
                cross(inn[2], o),
            ];
            b.push(CellType::Prism, &nodes, triangulate);
        }
    }
}

/// Zero level set inside the simplex.
fn interface(b: &mut Builder<'_>, tdim: usize, neg: &[usize], pos: &[usize], triangulate: bool) {
    if neg.is_empty() || pos.is_empty() {
        return;
    }
    match (tdim, neg.len(), pos.len()) {
        (1, _, _) => b.push(CellType::Point, &[cross(neg[0], pos[0])], triangulate),
        (2, 1, _) => b.push(
            CellType::Interval,
            &[cross(neg[0], pos[0]), cross(neg[0], pos[1])],
            triangulate,
        ),
        (2, _, _) => b.push(
            CellType::Interval,
            &[cross(neg[0], pos[0]), cross(neg[1], pos[0])],
            triangulate,
        ),
        (_, 1, _) => {
            let a = neg[0];
            let nodes = [cross(a, pos[0]), cross(a, pos[1]), cross(a, pos[2])];
            b.push(CellType::Triangle, &nodes, triangulate);
        }
        (_, _, 1) => {
            let d = pos[0];
            let nodes = [cross(neg[0], d), cross(neg[1], d), cross(neg[2], d)];
            b.push(CellType::Triangle, &nodes, triangulate);
        }
        _ => {
            let (a, c) = (neg[0], neg[1]);
            let (o, p) = (pos[0], pos[1]);
            let nodes = [cross(a, o), cross(a, p), cross(c, o), cross(c, p)];
            b.push(CellType::Quadrilateral, &nodes, triangulate);
        }
    }
}

/// Reference-cell coordinates and level-set values of entity `e`.
fn reference_entity<C: Communicator>(
    level_set: &Function<C>,
    phi: &[f64],
    dim: usize,
    e: usize,
) -> Result<(CellType, Vec<f64>, Vec<f64>), MeshError> {
    let topology = level_set.function_space().mesh().topology();
    let entity_type = topology.cell_type().sub_entity_type(dim, 0);
    let verts = entity_vertices(topology, dim, e)?;
    let x = entity_type
        .reference_vertices()
        .iter()
        .flat_map(|v| v[..dim].iter().copied())
        .collect();
    Ok((entity_type, x, verts.iter().map(|&v| phi[v]).collect()))
}

/// Local vertex to geometry node map, from the vertex-first node ordering.
fn vertex_nodes<C: Communicator>(level_set: &Function<C>) -> Vec<usize> {
    let mesh = level_set.function_space().mesh();
    let topology = mesh.topology();
    let dofmap = mesh.geometry().dofmap();
    let mut out = vec![0; topology.num_entities(0).unwrap_or(0)];
    for c in 0..dofmap.num_nodes() {
        for (&v, &n) in topology.cell_vertices(c).iter().zip(dofmap.links(c)) {
            out[v] = n;
        }
    }
    out
}

fn check_entities<C: Communicator>(
    level_set: &Function<C>,
    entities: &[usize],
    dim: usize,
) -> Result<(), MeshError> {
    let topology = level_set.function_space().mesh().topology();
    if dim == 0 || dim > topology.dim() {
        return Err(MeshError::InvalidIndex {
            index: dim,
            size: topology.dim() + 1,
        });
    }
    let n = topology.num_entities(dim).ok_or(MeshError::MissingEntities(dim))?;
    match entities.iter().find(|&&e| e >= n) {
        Some(&bad) => Err(MeshError::InvalidIndex { index: bad, size: n }),
        None => Ok(()),
    }
}

/// Cut `entities` of dimension `dim` in their reference coordinates.
///
/// Appends one [`CutCell`] per entity to `out`, in input order, empty when
/// nothing of the entity satisfies `predicate`.
pub fn cut_reference_entities<C: Communicator>(
    level_set: &Function<C>,
    entities: &[usize],
    dim: usize,
    predicate: &str,
    triangulate: bool,
    out: &mut Vec<CutCell>,
) -> Result<(), MeshError> {
    cut_reference_entities_with(
        &LinearCutter,
        level_set,
        entities,
        dim,
        &Predicate::parse(predicate)?,
        triangulate,
        out,
    )
}

/// [`cut_reference_entities`] with an explicit cutter.
pub fn cut_reference_entities_with<C: Communicator>(
    cutter: &dyn CellCutter,
    level_set: &Function<C>,
    entities: &[usize],
    dim: usize,
    predicate: &Predicate,
    triangulate: bool,
    out: &mut Vec<CutCell>,
) -> Result<(), MeshError> {
    check_entities(level_set, entities, dim)?;
    let phi = level_set.vertex_values();
    out.reserve(entities.len());
    for &e in entities {
        let (entity_type, x, values) = reference_entity(level_set, &phi, dim, e)?;
        let mut cc = cutter.cut(entity_type, &x, dim, &values, predicate, triangulate)?;
        cc.parent_cell_index = vec![e as i32; cc.num_fragments()];
        out.push(cc);
    }
    Ok(())
}

/// Cut `entities` of dimension `dim` in physical coordinates.
///
/// Entities without fragments are left out; `parent_map` lists the entity
/// of every returned cut cell.
pub fn cut_entities<C: Communicator>(
    level_set: &Function<C>,
    entities: &[usize],
    dim: usize,
    predicate: &str,
    triangulate: bool,
) -> Result<CutCells, MeshError> {
    cut_entities_with(
        &LinearCutter,
        level_set,
        entities,
        dim,
        &Predicate::parse(predicate)?,
        triangulate,
    )
}

/// [`cut_entities`] with an explicit cutter.
pub fn cut_entities_with<C: Communicator>(
    cutter: &dyn CellCutter,
    level_set: &Function<C>,
    entities: &[usize],
    dim: usize,
    predicate: &Predicate,
    triangulate: bool,
) -> Result<CutCells, MeshError> {
    check_entities(level_set, entities, dim)?;
    let mesh = level_set.function_space().mesh();
    let topology = mesh.topology();
    let geometry = mesh.geometry();
    let gdim = geometry.dim();
    let entity_type = topology.cell_type().sub_entity_type(dim, 0);
    let phi = level_set.vertex_values();
    let nodes = vertex_nodes(level_set);

    let mut cut = CutCells::default();
    for &e in entities {
        let verts = entity_vertices(topology, dim, e)?;
        let x: Vec<f64> = verts
            .iter()
            .flat_map(|&v| geometry.node(nodes[v]).into_iter().take(gdim))
            .collect();
        let values: Vec<f64> = verts.iter().map(|&v| phi[v]).collect();
        let mut cc = cutter.cut(entity_type, &x, gdim, &values, predicate, triangulate)?;
        if cc.is_empty() {
            continue;
        }
        cc.parent_cell_index = vec![e as i32; cc.num_fragments()];
        cut.cut_cells.push(cc);
        cut.parent_map.push(e as i32);
    }
    log::debug!(
        "[rank {}] cut {} of {} entities",
        mesh.comm().rank(),
        cut.cut_cells.len(),
        entities.len()
    );
    Ok(cut)
}
