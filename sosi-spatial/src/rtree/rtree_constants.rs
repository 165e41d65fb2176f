//! Constants for the in-memory R-tree.

/// Default maximum number of children per node.
pub const DEFAULT_FAN_OUT: usize = 3;

/// Smallest fan-out that can still split an overflowing node in two.
pub const MIN_FAN_OUT: usize = 2;

/// Inline child capacity. Fan-outs up to `INLINE_CHILDREN - 1` never allocate
/// per node, including the transient overflow entry before a split.
pub(crate) const INLINE_CHILDREN: usize = 4;
