//! MeshError: unified error type for cutfem-sieve public APIs
//!
//! Every fallible operation in the crate reports through this enum. The
//! variants are grouped by where the failure is detected: input-shape checks
//! (run before any collective), topology consistency checks (inside the
//! distributed collectives), kernel/element mismatches (assembly) and
//! communication failures.

use crate::topology::cell_type::CellType;
use thiserror::Error;

/// Unified error type for mesh construction, classification, quadrature and
/// assembly.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    // ----- input shape -----------------------------------------------------
    /// Flattened connectivity length is not a multiple of the per-cell node count.
    #[error("connectivity length {len} is not a multiple of {stride} nodes per cell")]
    ConnectivityStride { len: usize, stride: usize },
    /// Coordinate buffer does not match the declared `(rows, gdim)` shape.
    #[error("coordinate buffer of length {len} does not match shape ({rows}, {gdim})")]
    CoordinateShape { len: usize, rows: usize, gdim: usize },
    /// Geometric dimension outside `tdim..=3`.
    #[error("geometric dimension {gdim} is invalid for {cell_type:?}")]
    InvalidGeometricDimension { cell_type: CellType, gdim: usize },
    /// A cell, entity or node index outside the local range.
    #[error("index {index} out of range (size {size})")]
    InvalidIndex { index: usize, size: usize },
    /// Element family/degree/cell combination is not supported.
    #[error("unsupported element: {0}")]
    UnsupportedElement(String),
    /// Operation requires a single cell type.
    #[error("mixed cell types are not supported: found {first:?} and {other:?}")]
    MixedCellTypes { first: CellType, other: CellType },
    /// A level-set predicate string could not be parsed.
    #[error("invalid level-set predicate `{0}`")]
    InvalidPredicate(String),
    /// A value buffer has the wrong length.
    #[error("{what}: expected {expected} values, found {found}")]
    ValueLength {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// Ghost ownership list does not fit the connectivity table.
    #[error("{ghosts} ghost cells declared but only {cells} cells present")]
    GhostCount { ghosts: usize, cells: usize },
    /// No rank holds a single cut fragment.
    #[error("cut cell collection holds no fragments on any rank")]
    EmptyCutMesh,
    /// A form or cut form was assembled with the wrong rank entry point.
    #[error("form rank mismatch: expected {expected}, found {found}")]
    FormRank { expected: usize, found: usize },
    /// A constant or coefficient named by a kernel was not supplied.
    #[error("missing form input `{0}`")]
    MissingFormInput(String),
    /// Evaluation mode requested from a kernel that does not provide it.
    #[error("kernel `{kernel}` does not support {mode} evaluation")]
    UnsupportedEvaluation {
        kernel: &'static str,
        mode: &'static str,
    },

    // ----- topology / geometry consistency ---------------------------------
    /// More than two cells (across all ranks) claim the same facet.
    #[error("facet {vertices:?} is shared by {count} cells (expected at most 2)")]
    InconsistentSharedFacet { vertices: Vec<i64>, count: usize },
    /// A global node index has no coordinate row on any rank.
    #[error("node {0} has no coordinate entry on any rank")]
    UnresolvedNode(i64),
    /// No rank holds the entity in an owned cell.
    #[error("entity {0:?} is not owned by any rank")]
    UnownedEntity(Vec<i64>),
    /// Entities of the given dimension have not been created yet.
    #[error("entities of dimension {0} have not been created")]
    MissingEntities(usize),
    /// A peer rank failed inside a collective; this rank aborts as well.
    #[error("collective `{0}` failed on a remote rank")]
    RemoteFailure(&'static str),
    /// A reference Jacobian is singular.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    // ----- kernel / element -----------------------------------------------
    /// Tabulated element does not match what the kernel was generated for.
    #[error("finite element hash mismatch for integral {integral} slot {slot}: kernel expects {expected:#x}, element has {found:#x}")]
    ElementHashMismatch {
        integral: i32,
        slot: usize,
        expected: u64,
        found: u64,
    },

    // ----- communication ---------------------------------------------------
    /// A send/receive with a neighbour failed.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError { neighbor: usize, r#source: String },
    /// A received buffer has an unexpected size.
    #[error("wire length mismatch from rank {neighbor}: expected {expected} bytes, got {found}")]
    WireLength {
        neighbor: usize,
        expected: usize,
        found: usize,
    },
}

impl MeshError {
    /// True for errors that mean another rank already failed.
    pub fn is_remote(&self) -> bool {
        matches!(self, MeshError::RemoteFailure(_))
    }
}
