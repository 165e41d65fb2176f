//! Arena-based R-tree over group bounding boxes.
//!
//! Nodes hold at most `fan_out` children (3 by default). Parent links are
//! arena indices, so the tree has a single owner and no reference cycles.

mod rtree_constants;
mod rtree_impl;
mod rtree_types;

pub use rtree_constants::{DEFAULT_FAN_OUT, MIN_FAN_OUT};
pub use rtree_impl::{Query, SpatialIndex};
pub use rtree_types::{
    FlateHit, IndexChange, LeafHandle, RTreeStats, SpatialError, SpatialResult,
};
