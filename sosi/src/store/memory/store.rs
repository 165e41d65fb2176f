use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::{IndexMap, IndexSet};

use super::StoredGroup;
use crate::common::{GroupRef, LayerMask};
use crate::errors::{ErrorKind, SosiError, SosiResult};
use crate::store::{
    AttributeOccurrence, AttributeSource, BoundaryMember, GroupKind, GroupStore,
    PointAttributeSource,
};

/// In-memory group store.
///
/// Keeps groups in insertion order, which is the "store order" every
/// sequential sweep follows. Attribute reads are counted so tests can
/// observe how many fetches an evaluation performed.
///
/// ```rust
/// use sosi::common::GroupRef;
/// use sosi::store::{AttributeSource, GroupStore, MemoryGroupStore, StoredGroup};
///
/// let mut store = MemoryGroupStore::new();
/// let road = store.add_group(1, StoredGroup::line().with_attribute("..NAVN VEG"));
/// store.select_group(road).unwrap();
/// assert_eq!(store.attribute("NAVN", 1).unwrap().value, "VEG");
/// assert_eq!(store.attribute_fetches(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    groups: IndexMap<GroupRef, StoredGroup>,
    current: Option<GroupRef>,
    found: IndexSet<GroupRef>,
    base_extent: Option<[f64; 4]>,
    attribute_fetches: AtomicUsize,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        MemoryGroupStore::default()
    }

    /// Stores `group` under the next free group number of `file_id`.
    pub fn add_group(&mut self, file_id: u32, group: StoredGroup) -> GroupRef {
        let next = self
            .groups
            .keys()
            .filter(|r| r.file_id() == file_id)
            .map(|r| r.group_number())
            .max()
            .unwrap_or(0)
            + 1;
        let group_ref = GroupRef::new(file_id, next);
        self.groups.insert(group_ref, group);
        group_ref
    }

    /// Stores `group` under an explicit reference, replacing any previous group.
    pub fn insert_group(&mut self, group_ref: GroupRef, group: StoredGroup) -> Option<StoredGroup> {
        self.groups.insert(group_ref, group)
    }

    /// Sets the header group (group 0) of `file_id`.
    pub fn set_header(&mut self, file_id: u32, header: StoredGroup) {
        self.groups.insert(GroupRef::header(file_id), header);
    }

    pub fn remove_group(&mut self, group_ref: GroupRef) -> Option<StoredGroup> {
        if self.current == Some(group_ref) {
            self.current = None;
        }
        self.found.shift_remove(&group_ref);
        self.groups.shift_remove(&group_ref)
    }

    pub fn group(&self, group_ref: GroupRef) -> Option<&StoredGroup> {
        self.groups.get(&group_ref)
    }

    pub fn group_mut(&mut self, group_ref: GroupRef) -> Option<&mut StoredGroup> {
        self.groups.get_mut(&group_ref)
    }

    /// The current group's stored data.
    pub fn current(&self) -> Option<&StoredGroup> {
        self.current.and_then(|r| self.groups.get(&r))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn is_found(&self, group_ref: GroupRef) -> bool {
        self.found.contains(&group_ref)
    }

    /// Groups marked found, in marking order.
    pub fn found_groups(&self) -> Vec<GroupRef> {
        self.found.iter().copied().collect()
    }

    /// Declares the extent of the whole base as `[min_east, min_north, max_east, max_north]`.
    pub fn set_base_extent(&mut self, extent: [f64; 4]) {
        self.base_extent = Some(extent);
    }

    pub fn base_extent(&self) -> Option<[f64; 4]> {
        self.base_extent
    }

    /// Number of attribute reads (GINFO and PINFO) since creation or the last reset.
    pub fn attribute_fetches(&self) -> usize {
        self.attribute_fetches.load(Ordering::Relaxed)
    }

    pub fn reset_fetch_counter(&self) {
        self.attribute_fetches.store(0, Ordering::Relaxed);
    }

    fn count_fetch(&self) {
        self.attribute_fetches.fetch_add(1, Ordering::Relaxed);
    }
}

impl AttributeSource for MemoryGroupStore {
    fn attribute(&self, name: &str, start_line: usize) -> Option<AttributeOccurrence> {
        self.count_fetch();
        self.current()?.find_attribute(name, start_line)
    }
}

impl PointAttributeSource for MemoryGroupStore {
    fn point_attribute(
        &self,
        name: &str,
        point: usize,
        occurrence: usize,
    ) -> Option<AttributeOccurrence> {
        self.count_fetch();
        self.current()?.find_point_attribute(name, point, occurrence)
    }

    fn has_point_info(&self, point: usize) -> bool {
        self.current()
            .and_then(|g| g.points().get(point.checked_sub(1)?))
            .is_some_and(|p| !p.pinfo.is_empty())
    }
}

impl GroupStore for MemoryGroupStore {
    fn groups(&self, layers: LayerMask) -> Vec<GroupRef> {
        self.groups
            .iter()
            .filter(|(r, g)| !r.is_header() && layers.contains(g.layer()))
            .map(|(r, _)| *r)
            .collect()
    }

    fn current_group(&self) -> Option<GroupRef> {
        self.current
    }

    fn select_group(&mut self, group: GroupRef) -> SosiResult<()> {
        if !self.groups.contains_key(&group) {
            log::error!("Group {} does not exist in the store", group);
            return Err(SosiError::new(
                &format!("Group {} does not exist in the store", group),
                ErrorKind::GroupNotFound,
            ));
        }
        self.current = Some(group);
        Ok(())
    }

    fn clear_current(&mut self) {
        self.current = None;
    }

    fn group_kind(&self, group: GroupRef) -> Option<GroupKind> {
        self.groups.get(&group).map(|g| g.kind())
    }

    fn point_count(&self) -> usize {
        self.current().map_or(0, |g| g.points().len())
    }

    fn is_layer_member(&self, group: GroupRef, layers: LayerMask) -> bool {
        self.groups
            .get(&group)
            .is_some_and(|g| layers.contains(g.layer()))
    }

    fn boundary_members(&self, group: GroupRef) -> SosiResult<Vec<BoundaryMember>> {
        match self.groups.get(&group) {
            Some(stored) if stored.kind() == GroupKind::Flate => Ok(stored.boundary().to_vec()),
            Some(_) => {
                log::error!("Group {} is not a flate", group);
                Err(SosiError::new(
                    &format!("Group {} is not a flate", group),
                    ErrorKind::InvalidOperation,
                ))
            }
            None => {
                log::error!("Group {} does not exist in the store", group);
                Err(SosiError::new(
                    &format!("Group {} does not exist in the store", group),
                    ErrorKind::GroupNotFound,
                ))
            }
        }
    }

    fn mark_found(&mut self, group: GroupRef) {
        self.found.insert(group);
    }

    fn clear_found(&mut self) {
        self.found.clear();
    }
}
