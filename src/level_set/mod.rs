//! Level-set classification and cutting of mesh entities.

pub mod cut;
pub mod locate;
pub mod predicate;

pub use cut::{
    CellCutter, CutCell, CutCells, LinearCutter, cut_entities, cut_entities_with,
    cut_reference_entities, cut_reference_entities_with,
};
pub use locate::{INTERFACE_TOLERANCE, LevelSetConfig, locate_entities, locate_entities_with};
pub use predicate::{CutTarget, Location, Predicate};
