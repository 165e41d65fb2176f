//! Core types for the arena R-tree: errors, handles and statistics.

use sosi::common::GroupRef;
use sosi::errors::{ErrorKind, SosiError};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors from spatial indexing operations
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("Invalid leaf handle: {0}")]
    InvalidHandle(LeafHandle),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Tree invariant violated: {0}")]
    Invariant(String),

    #[error("Store error: {0}")]
    Store(SosiError),
}

impl From<SosiError> for SpatialError {
    fn from(err: SosiError) -> Self {
        SpatialError::Store(err)
    }
}

impl From<SpatialError> for SosiError {
    fn from(err: SpatialError) -> Self {
        match err {
            SpatialError::Store(inner) => inner,
            SpatialError::InvalidOperation(msg) => {
                SosiError::new(&msg, ErrorKind::InvalidOperation)
            }
            other => SosiError::new(
                &other.to_string(),
                ErrorKind::Extension("spatial".to_string()),
            ),
        }
    }
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;

// ============================================================================
// Handles
// ============================================================================

/// Arena slot of an internal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

/// Handle to one leaf of a [`SpatialIndex`](super::SpatialIndex).
///
/// Slots are reused, so a handle also carries the slot generation. A handle
/// goes stale when its leaf is deleted or updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeafHandle {
    pub(crate) slot: usize,
    pub(crate) generation: u32,
}

impl std::fmt::Display for LeafHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "leaf#{}.{}", self.slot, self.generation)
    }
}

// ============================================================================
// Results and statistics
// ============================================================================

/// What [`SpatialIndex::index_group`](super::SpatialIndex::index_group) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexChange {
    Inserted(LeafHandle),
    Updated(LeafHandle),
    Unchanged(LeafHandle),
    Removed,
    /// No box was given for a group that was not indexed.
    NotIndexed,
}

impl IndexChange {
    pub fn handle(&self) -> Option<LeafHandle> {
        match self {
            IndexChange::Inserted(h) | IndexChange::Updated(h) | IndexChange::Unchanged(h) => {
                Some(*h)
            }
            IndexChange::Removed | IndexChange::NotIndexed => None,
        }
    }
}

/// A polygon hit from a flate window query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlateHit {
    pub flate: GroupRef,
    /// Boundary members in store order.
    pub members: Vec<GroupRef>,
}

/// Statistics about the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RTreeStats {
    pub entries: usize,
    pub nodes: usize,
    pub height: usize,
    /// Node splits since creation
    pub splits: u64,
    /// Emptied nodes removed by deletes since creation
    pub pruned_nodes: u64,
}
