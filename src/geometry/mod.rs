//! Mesh geometry: coordinate elements, coordinate redistribution and the
//! node arena attached to a topology.

pub mod builder;
pub mod distribute;
pub mod element;

pub use builder::{Geometry, create_geometry};
pub use distribute::distribute_data;
pub use element::{CoordinateElement, ElementDofLayout};
