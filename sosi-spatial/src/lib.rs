//! # sosi_spatial - geographic search for SOSI group stores
//!
//! This crate adds the geographic half of the search core: an in-memory
//! R-tree over group bounding boxes and a search cursor that answers
//! window queries either through the tree or by a sequential scan.
//!
//! ## Features
//!
//! - **Arena R-tree**: fan-out 3 by default, least-enlargement insertion,
//!   linear split, prune-on-delete, checkable invariants
//! - **Search cursor**: find first / find next over a snapshot of hits, with
//!   sequential, indexed and automatic method selection
//! - **Polygon queries**: window queries that return polygons together with
//!   their boundary members
//! - **Shared use**: [`SharedSpatialIndex`] puts one index behind one lock
//!
//! ## R-Tree API
//!
//! ```rust
//! use sosi::common::GroupRef;
//! use sosi_spatial::{BoundingBox, SpatialIndex};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut index = SpatialIndex::new();
//! let handle = index.insert(GroupRef::new(1, 1), BoundingBox::new(0.0, 0.0, 10.0, 10.0));
//!
//! let query = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
//! assert_eq!(index.query(&query).count(), 1);
//!
//! index.update(handle, BoundingBox::new(20.0, 20.0, 21.0, 21.0))?;
//! assert_eq!(index.query(&query).count(), 0);
//! index.check_invariants()?;
//! # Ok(())
//! # }
//! ```

pub mod bounding_box;
pub mod rtree;
pub mod search_cursor;
pub mod shared_index;
pub mod spatial_store;

pub use bounding_box::BoundingBox;
pub use rtree::{
    FlateHit, IndexChange, LeafHandle, Query, RTreeStats, SpatialError, SpatialIndex,
    SpatialResult, DEFAULT_FAN_OUT, MIN_FAN_OUT,
};
pub use search_cursor::{SearchCursor, SearchMethod, DEFAULT_AUTO_THRESHOLD};
pub use shared_index::SharedSpatialIndex;
pub use spatial_store::SpatialStore;
