//! Communication and graph algorithms shared by the mesh builders.
//!
//! - [`communicator`]: serial, thread and MPI message passing.
//! - [`wire`]: fixed-size `Pod` records exchanged between ranks.
//! - [`exchange`]: collectives built on point-to-point messages.
//! - [`dual_graph`]: facet-matched local dual graph.
//! - [`rcm`]: reverse Cuthill–McKee ordering.

pub mod communicator;
pub mod dual_graph;
pub mod exchange;
pub mod rcm;
pub mod wire;

pub use communicator::{Communicator, NoComm, RayonComm};
pub use exchange::{agree, all_gather_u64, all_reduce_sum, all_to_all_v, exclusive_scan_sum};
pub use rcm::reorder_rcm;
