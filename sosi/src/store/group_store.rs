use crate::common::{GroupRef, LayerMask};
use crate::errors::SosiResult;

/// One occurrence of a named attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeOccurrence {
    /// The attribute value with the name stripped.
    pub value: String,
    /// 1-based line (GINFO) or occurrence number (PINFO) where it was found.
    pub line: usize,
    /// True when the same name occurs again further down.
    pub has_more: bool,
}

/// Reads group-level attributes (GINFO) of the current group.
pub trait AttributeSource {
    /// Returns the first occurrence of `name` at or after `start_line` (1-based).
    fn attribute(&self, name: &str, start_line: usize) -> Option<AttributeOccurrence>;
}

/// Reads coordinate-level attributes (PINFO) of the current group.
pub trait PointAttributeSource {
    /// Returns the `occurrence`-th (1-based) value of `name` on coordinate `point` (1-based).
    fn point_attribute(
        &self,
        name: &str,
        point: usize,
        occurrence: usize,
    ) -> Option<AttributeOccurrence>;

    /// Whether coordinate `point` carries any PINFO at all.
    fn has_point_info(&self, _point: usize) -> bool {
        true
    }
}

/// Kind of a stored group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupKind {
    Header,
    Point,
    Line,
    Flate,
    Other,
}

/// One member group of a polygon boundary, in boundary order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundaryMember {
    pub group: GroupRef,
    /// First member of a hole ring.
    pub is_hole_start: bool,
    /// Last member of a hole ring.
    pub is_hole_end: bool,
}

impl BoundaryMember {
    pub fn outer(group: GroupRef) -> Self {
        BoundaryMember {
            group,
            is_hole_start: false,
            is_hole_end: false,
        }
    }
}

/// The group store as seen by sweeps and searches.
///
/// A store has exactly one current-group register. Attribute reads go to
/// the current group; sweeps move the register and must put it back with
/// [`restore_current_group`] when they finish, whether they complete or not.
pub trait GroupStore: AttributeSource + PointAttributeSource {
    /// All groups in the given layers, in store order. The header is excluded.
    fn groups(&self, layers: LayerMask) -> Vec<GroupRef>;

    fn current_group(&self) -> Option<GroupRef>;

    /// Makes `group` the current group.
    fn select_group(&mut self, group: GroupRef) -> SosiResult<()>;

    /// Leaves the store without a current group.
    fn clear_current(&mut self);

    fn group_kind(&self, group: GroupRef) -> Option<GroupKind>;

    /// Number of coordinates in the current group.
    fn point_count(&self) -> usize;

    fn is_layer_member(&self, group: GroupRef, layers: LayerMask) -> bool;

    /// Members of a polygon boundary, outer ring first then holes.
    fn boundary_members(&self, group: GroupRef) -> SosiResult<Vec<BoundaryMember>>;

    /// Sets the group's bit in the store's "found" bitmap.
    fn mark_found(&mut self, group: GroupRef);

    /// Clears the whole "found" bitmap.
    fn clear_found(&mut self);

    fn is_flate(&self, group: GroupRef) -> bool {
        self.group_kind(group) == Some(GroupKind::Flate)
    }
}

/// Puts the store's current-group register back to a saved value.
pub fn restore_current_group<S: GroupStore + ?Sized>(
    store: &mut S,
    saved: Option<GroupRef>,
) -> SosiResult<()> {
    match saved {
        Some(group) => store.select_group(group),
        None => {
            store.clear_current();
            Ok(())
        }
    }
}
