use crate::common::{GroupRef, LayerMask};
use crate::store::{AttributeOccurrence, BoundaryMember, GroupKind};

/// One coordinate of a stored group, with its PINFO lines.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredPoint {
    pub east: f64,
    pub north: f64,
    pub pinfo: Vec<String>,
}

impl StoredPoint {
    pub fn new(east: f64, north: f64) -> Self {
        StoredPoint {
            east,
            north,
            pinfo: Vec::new(),
        }
    }

    /// Adds a PINFO entry such as `"..HRV 12"`.
    pub fn with_info(mut self, info: &str) -> Self {
        self.pinfo.push(info.to_string());
        self
    }
}

/// A group held by [`MemoryGroupStore`](super::MemoryGroupStore).
///
/// GINFO lines are kept as raw text. The first whitespace-delimited token
/// of a line is the attribute name and the rest is the value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StoredGroup {
    kind: GroupKind,
    layer: LayerMask,
    ginfo: Vec<String>,
    points: Vec<StoredPoint>,
    boundary: Vec<BoundaryMember>,
    unit: f64,
}

impl StoredGroup {
    pub fn new(kind: GroupKind) -> Self {
        StoredGroup {
            kind,
            layer: LayerMask::FOREGROUND,
            ginfo: Vec::new(),
            points: Vec::new(),
            boundary: Vec::new(),
            unit: 1.0,
        }
    }

    pub fn point() -> Self {
        StoredGroup::new(GroupKind::Point)
    }

    pub fn line() -> Self {
        StoredGroup::new(GroupKind::Line)
    }

    pub fn flate() -> Self {
        StoredGroup::new(GroupKind::Flate)
    }

    pub fn header() -> Self {
        StoredGroup::new(GroupKind::Header)
    }

    pub fn in_layer(mut self, layer: LayerMask) -> Self {
        self.layer = layer;
        self
    }

    /// Appends a GINFO line such as `"..NAVN Storgata"`.
    pub fn with_attribute(mut self, line: &str) -> Self {
        self.ginfo.push(line.to_string());
        self
    }

    pub fn with_point(mut self, point: StoredPoint) -> Self {
        self.points.push(point);
        self
    }

    pub fn with_coordinates(mut self, coordinates: &[(f64, f64)]) -> Self {
        self.points
            .extend(coordinates.iter().map(|(e, n)| StoredPoint::new(*e, *n)));
        self
    }

    pub fn with_boundary_member(mut self, member: BoundaryMember) -> Self {
        self.boundary.push(member);
        self
    }

    /// Appends a hole ring. The first and last members carry the hole marks.
    pub fn with_hole(mut self, members: &[GroupRef]) -> Self {
        let last = members.len().saturating_sub(1);
        for (index, group) in members.iter().enumerate() {
            self.boundary.push(BoundaryMember {
                group: *group,
                is_hole_start: index == 0,
                is_hole_end: index == last,
            });
        }
        self
    }

    pub fn with_unit(mut self, unit: f64) -> Self {
        self.unit = unit;
        self
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn layer(&self) -> LayerMask {
        self.layer
    }

    pub fn ginfo(&self) -> &[String] {
        &self.ginfo
    }

    pub fn points(&self) -> &[StoredPoint] {
        &self.points
    }

    pub fn boundary(&self) -> &[BoundaryMember] {
        &self.boundary
    }

    pub fn unit(&self) -> f64 {
        self.unit
    }

    pub(crate) fn find_attribute(&self, name: &str, start_line: usize) -> Option<AttributeOccurrence> {
        let start = start_line.max(1);
        find_in_lines(&self.ginfo, name, start)
    }

    pub(crate) fn find_point_attribute(
        &self,
        name: &str,
        point: usize,
        occurrence: usize,
    ) -> Option<AttributeOccurrence> {
        let stored = self.points.get(point.checked_sub(1)?)?;
        let wanted = occurrence.max(1);
        let mut seen = 0;
        let mut found: Option<AttributeOccurrence> = None;
        for info in &stored.pinfo {
            if let Some(value) = split_attribute(info, name) {
                seen += 1;
                if let Some(hit) = found.as_mut() {
                    hit.has_more = true;
                    break;
                }
                if seen == wanted {
                    found = Some(AttributeOccurrence {
                        value: value.to_string(),
                        line: seen,
                        has_more: false,
                    });
                }
            }
        }
        found
    }
}

fn find_in_lines(lines: &[String], name: &str, start: usize) -> Option<AttributeOccurrence> {
    let mut found: Option<AttributeOccurrence> = None;
    for (index, line) in lines.iter().enumerate().skip(start - 1) {
        if let Some(value) = split_attribute(line, name) {
            if let Some(hit) = found.as_mut() {
                hit.has_more = true;
                break;
            }
            found = Some(AttributeOccurrence {
                value: value.to_string(),
                line: index + 1,
                has_more: false,
            });
        }
    }
    found
}

/// Returns the value part of `line` when its attribute name equals `name`.
///
/// Leading dots are ignored on both names and the comparison is
/// case-insensitive, so `"NAVN"` finds `"..NAVN Storgata"`.
pub(crate) fn split_attribute<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let trimmed = line.trim_start();
    let (head, rest) = match trimmed.find(char::is_whitespace) {
        Some(pos) => (&trimmed[..pos], &trimmed[pos..]),
        None => (trimmed, ""),
    };
    let bare = |s: &str| s.trim_start_matches('.').to_string();
    if bare(head).eq_ignore_ascii_case(&bare(name)) && !bare(name).is_empty() {
        Some(rest.trim())
    } else {
        None
    }
}
