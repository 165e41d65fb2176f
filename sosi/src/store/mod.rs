//! Collaborator interfaces consumed by the selection and search core.
//!
//! The core never owns group data. It reads attributes, coordinates and
//! polygon topology through these traits and writes back only two things:
//! the store's current-group register and its "found" bitmap.

mod group_store;
pub mod memory;

pub use group_store::*;
pub use memory::{MemoryGroupStore, StoredGroup, StoredPoint};
