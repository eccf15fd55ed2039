//! Classification of mesh entities against a nodal level set.

use super::predicate::{Location, Predicate};
use crate::algs::communicator::Communicator;
use crate::fem::function::Function;
use crate::mesh_error::MeshError;
use crate::topology::distributed::Topology;
use serde::{Deserialize, Serialize};

/// Values with `|phi| <= INTERFACE_TOLERANCE` count as lying on the
/// interface.
pub const INTERFACE_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelSetConfig {
    /// Half-width of the band around zero classified as interface.
    pub tolerance: f64,
}

impl Default for LevelSetConfig {
    fn default() -> Self {
        Self {
            tolerance: INTERFACE_TOLERANCE,
        }
    }
}

/// Local vertices of entity `e` of dimension `dim >= 1`.
pub(crate) fn entity_vertices(
    topology: &Topology,
    dim: usize,
    e: usize,
) -> Result<&[usize], MeshError> {
    if dim == topology.dim() {
        Ok(topology.cell_vertices(e))
    } else {
        topology
            .connectivity(dim, 0)
            .map(|c| c.links(e))
            .ok_or(MeshError::MissingEntities(dim))
    }
}

/// Local indices of the entities of dimension `dim` selected by `predicate`,
/// ascending and without duplicates. Ghost entities are included only when
/// `include_ghosts` is set.
pub fn locate_entities<C: Communicator>(
    level_set: &Function<C>,
    dim: usize,
    predicate: &str,
    include_ghosts: bool,
) -> Result<Vec<usize>, MeshError> {
    locate_entities_with(
        level_set,
        dim,
        &Predicate::parse(predicate)?,
        include_ghosts,
        &LevelSetConfig::default(),
    )
}

/// [`locate_entities`] with an explicit predicate and tolerance.
pub fn locate_entities_with<C: Communicator>(
    level_set: &Function<C>,
    dim: usize,
    predicate: &Predicate,
    include_ghosts: bool,
    config: &LevelSetConfig,
) -> Result<Vec<usize>, MeshError> {
    let mesh = level_set.function_space().mesh();
    let topology = mesh.topology();
    let tdim = topology.dim();
    if dim > tdim {
        return Err(MeshError::InvalidIndex {
            index: dim,
            size: tdim + 1,
        });
    }
    let map = topology.index_map(dim).ok_or(MeshError::MissingEntities(dim))?;
    let n = if include_ghosts {
        map.size_total()
    } else {
        map.size_local()
    };
    let phi = level_set.vertex_values();
    let mut out = Vec::new();
    for e in 0..n {
        let loc = if dim == 0 {
            Location::classify([phi[e]], config.tolerance)
        } else {
            let verts = entity_vertices(topology, dim, e)?;
            Location::classify(verts.iter().map(|&v| phi[v]), config.tolerance)
        };
        if predicate.contains(loc) {
            out.push(e);
        }
    }
    log::debug!(
        "[rank {}] {} of {n} entities of dim {dim} satisfy `{predicate}`",
        mesh.comm().rank(),
        out.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::fem::element::FiniteElement;
    use crate::fem::function::FunctionSpace;
    use crate::mesh::MeshConfig;
    use crate::mesh::generation::create_rectangle;
    use crate::topology::cell_type::CellType;
    use std::sync::Arc;

    fn level_set(n: usize, f: impl Fn([f64; 3]) -> f64, reorder: bool) -> Function<NoComm> {
        let cfg = MeshConfig {
            reorder_cells: reorder,
            ..Default::default()
        };
        let mesh = create_rectangle(&NoComm, [-1.0, -1.0], [1.0, 1.0], [n, n], CellType::Triangle, &cfg)
            .unwrap();
        let el = FiniteElement::new(CellType::Triangle, 1).unwrap();
        let v = Arc::new(FunctionSpace::new(Arc::new(mesh), el).unwrap());
        let mut phi = Function::new(v);
        phi.interpolate(f).unwrap();
        phi
    }

    #[test]
    fn negative_everywhere() {
        let phi = level_set(3, |_| -1.0, true);
        let all = locate_entities(&phi, 2, "phi<0", false).unwrap();
        assert_eq!(all, (0..18).collect::<Vec<_>>());
        assert!(locate_entities(&phi, 2, "phi=0", false).unwrap().is_empty());
        assert!(locate_entities(&phi, 2, "phi>0", false).unwrap().is_empty());
    }

    #[test]
    fn interior_facet_level_set() {
        // the zero line of x - y is the diagonal shared by the two cells
        let phi = level_set(1, |x| x[0] - x[1], false);
        let cut = locate_entities(&phi, 2, "phi=0", false).unwrap();
        assert_eq!(cut, vec![0, 1]);
        assert!(locate_entities(&phi, 2, "phi<0", false).unwrap().is_empty());
    }

    #[test]
    fn vertices_and_edges() {
        let phi = level_set(2, |x| x[0], false);
        let on = locate_entities(&phi, 0, "phi=0", false).unwrap();
        assert_eq!(on.len(), 3);
        assert_eq!(
            locate_entities(&phi, 1, "phi<0", false).unwrap_err(),
            MeshError::MissingEntities(1)
        );
    }

    #[test]
    fn bad_predicate() {
        let phi = level_set(1, |x| x[0], false);
        assert!(matches!(
            locate_entities(&phi, 2, "phi<<0", false),
            Err(MeshError::InvalidPredicate(_))
        ));
    }
}
