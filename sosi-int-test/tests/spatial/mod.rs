//! Spatial integration tests.
//!
//! These verify the R-tree and the geographic search cursor against the
//! same store the selection tests use.

mod search_cursor_test;
mod spatial_index_test;
