//! Claim spatial partitioning
//!
//! Block-coordinate geometry for claims plus a chunk-cell grid that buckets
//! claim footprints, so point lookups only test the few claims touching the
//! point's cell.

pub mod bounds;
pub mod cell;
pub mod grid;

pub use bounds::{BlockPos, Bounds};
pub use cell::{CELL_SHIFT, CELL_SIZE, CellKey};
pub use grid::SpatialGrid;
