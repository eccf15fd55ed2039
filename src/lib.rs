#![cfg_attr(docsrs, feature(doc_cfg))]
//! # cutfem-sieve
//!
//! cutfem-sieve builds distributed meshes for cut finite element methods and
//! assembles forms over the cut parts of cells with quadrature generated at
//! run time.
//!
//! ## Features
//! - Distributed mesh construction from per-rank cell lists and coordinate
//!   blocks: topology reconciliation, owned/ghost index maps, optional
//!   bandwidth-reducing cell reordering, geometry redistribution
//! - On-demand creation of edges and facets with global numbering
//! - Level-set classification of entities (`"phi<0"`, `"phi=0"`, ...)
//! - Linear cutting of simplices and meshes built from cut fragments
//! - Runtime quadrature on cut cells and interfaces
//! - Dual-mode element kernels and an assembler for scalar, vector and
//!   matrix cut forms
//! - Pluggable communication backends (serial, Rayon threads, MPI)
//!
//! ## Collectives
//!
//! Every function documented as collective must be called by all ranks of
//! the communicator in the same order. Input checks run before the first
//! exchange; a failure on any rank makes every rank return an error
//! ([`MeshError::RemoteFailure`](mesh_error::MeshError::RemoteFailure) on the
//! ranks that did not fail themselves).
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! cutfem-sieve = "0.1"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```

pub mod algs;
pub mod fem;
pub mod geometry;
pub mod level_set;
pub mod mesh;
pub mod mesh_error;
pub mod quadrature;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, RayonComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::fem::{
        AssemblyOptions, CutForm, FiniteElement, Form, FormDefinition, Function, FunctionSpace,
        IntegralType, LagrangeKernel, TabulateTensor, assemble_matrix, assemble_scalar,
        assemble_vector, create_cut_form, create_form,
    };
    pub use crate::geometry::{CoordinateElement, Geometry};
    pub use crate::level_set::{
        CutCell, CutCells, Predicate, cut_entities, cut_reference_entities, locate_entities,
    };
    pub use crate::mesh::generation::{create_box, create_interval, create_rectangle};
    pub use crate::mesh::{Mesh, MeshConfig, create_cut_mesh, create_mesh};
    pub use crate::mesh_error::MeshError;
    pub use crate::quadrature::{QuadratureRule, QuadratureRules, runtime_quadrature};
    pub use crate::topology::{CellType, IndexMap, Topology};
}
