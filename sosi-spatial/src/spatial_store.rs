//! Geometry access for group stores.

use sosi::common::GroupRef;
use sosi::store::{GroupStore, MemoryGroupStore};

use crate::BoundingBox;

/// A [`GroupStore`] that can also describe the geometry of its groups.
pub trait SpatialStore: GroupStore {
    /// Box of the group's own coordinates, inflated by its unit.
    /// `None` for unknown groups and groups without coordinates.
    fn group_box(&self, group: GroupRef) -> Option<BoundingBox>;

    /// Coordinate resolution of the group in file units.
    fn group_unit(&self, group: GroupRef) -> f64;

    /// Extent of the whole dataset, if known.
    fn base_extent(&self) -> Option<BoundingBox>;

    fn current_group_box(&self) -> Option<BoundingBox> {
        self.current_group().and_then(|group| self.group_box(group))
    }
}

impl SpatialStore for MemoryGroupStore {
    fn group_box(&self, group: GroupRef) -> Option<BoundingBox> {
        let stored = self.group(group)?;
        let coordinates: Vec<(f64, f64)> = stored
            .points()
            .iter()
            .map(|p| (p.east, p.north))
            .collect();
        BoundingBox::from_coordinates(&coordinates, stored.unit())
    }

    fn group_unit(&self, group: GroupRef) -> f64 {
        self.group(group).map_or(1.0, |g| g.unit())
    }

    fn base_extent(&self) -> Option<BoundingBox> {
        MemoryGroupStore::base_extent(self).map(|[min_x, min_y, max_x, max_y]| {
            BoundingBox::new(min_x, min_y, max_x, max_y)
        })
    }
}
