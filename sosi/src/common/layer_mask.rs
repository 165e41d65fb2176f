use std::fmt::{Display, Formatter};
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Selects which files of a base a sweep or search covers.
///
/// A base holds foreground files (being edited) and background files
/// (reference data). Masks combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerMask(u16);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const BACKGROUND: LayerMask = LayerMask(0x0002);
    pub const FOREGROUND: LayerMask = LayerMask(0x0004);
    pub const ALL: LayerMask = LayerMask(0x0006);

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn contains(&self, other: LayerMask) -> bool {
        other.0 != 0 && (self.0 & other.0) == other.0
    }

    /// True when the two masks share at least one layer.
    pub fn intersects(&self, other: LayerMask) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::FOREGROUND
    }
}

impl BitOr for LayerMask {
    type Output = LayerMask;

    fn bitor(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for LayerMask {
    fn bitor_assign(&mut self, rhs: LayerMask) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LayerMask {
    type Output = LayerMask;

    fn bitand(self, rhs: LayerMask) -> LayerMask {
        LayerMask(self.0 & rhs.0)
    }
}

impl Display for LayerMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (
            self.intersects(LayerMask::FOREGROUND),
            self.intersects(LayerMask::BACKGROUND),
        ) {
            (true, true) => write!(f, "foreground|background"),
            (true, false) => write!(f, "foreground"),
            (false, true) => write!(f, "background"),
            (false, false) => write!(f, "none"),
        }
    }
}
