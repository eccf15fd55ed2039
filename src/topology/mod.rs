//! Mesh topology: reference cells, numbering and distributed connectivity.
//!
//! - [`cell_type`]: reference cell data (vertices, sub-entities).
//! - [`adjacency`]: CSR adjacency lists.
//! - [`extract`]: vertex connectivity from higher-order node connectivity.
//! - [`index_map`]: owned/ghost numbering of one entity dimension.
//! - [`reconcile`]: postmaster-based ownership of shared entities.
//! - [`distributed`] and [`entities`]: the [`Topology`] and its builders.

pub mod adjacency;
pub mod cell_type;
pub mod distributed;
pub mod entities;
pub mod extract;
pub mod index_map;
pub mod reconcile;

pub use adjacency::AdjacencyList;
pub use cell_type::CellType;
pub use distributed::{Topology, create_topology};
pub use index_map::IndexMap;
