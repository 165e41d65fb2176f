use std::hash::Hash;

/// An axis-aligned rectangle in file units.
///
/// `min_x`/`max_x` run east and `min_y`/`max_y` run north. A valid box has
/// `min <= max` on both axes. [`BoundingBox::inverted`] is the one deliberate
/// exception: it is the box of an empty node and intersects nothing.
///
/// # Examples
///
/// ```rust
/// use sosi_spatial::BoundingBox;
///
/// let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
/// let b = BoundingBox::new(1.0, 1.0, 2.0, 2.0);
/// assert!(a.intersects(&b));
/// assert_eq!(a.union(&b), BoundingBox::new(0.0, 0.0, 2.0, 2.0));
/// ```
#[derive(Clone, Copy, PartialEq, Debug, serde::Deserialize, serde::Serialize)]
pub struct BoundingBox {
    /// Minimum east coordinate
    pub min_x: f64,
    /// Minimum north coordinate
    pub min_y: f64,
    /// Maximum east coordinate
    pub max_x: f64,
    /// Maximum north coordinate
    pub max_y: f64,
}

impl Eq for BoundingBox {}

impl Hash for BoundingBox {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.min_x.to_bits().hash(state);
        self.min_y.to_bits().hash(state);
        self.max_x.to_bits().hash(state);
        self.max_y.to_bits().hash(state);
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BoundingBox({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The box of an empty node. Its union with any box is that box.
    pub fn inverted() -> BoundingBox {
        BoundingBox {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    /// Box around `coordinates` (east, north), grown by `unit` on every side.
    ///
    /// The growth keeps the box of a single coordinate from having zero area.
    /// Returns `None` for an empty list.
    pub fn from_coordinates(coordinates: &[(f64, f64)], unit: f64) -> Option<BoundingBox> {
        let (first, rest) = coordinates.split_first()?;
        let mut bbox = BoundingBox::new(first.0, first.1, first.0, first.1);
        for &(east, north) in rest {
            bbox.min_x = bbox.min_x.min(east);
            bbox.min_y = bbox.min_y.min(north);
            bbox.max_x = bbox.max_x.max(east);
            bbox.max_y = bbox.max_y.max(north);
        }
        Some(bbox.inflate(unit))
    }

    /// A copy grown by `amount` on every side.
    pub fn inflate(&self, amount: f64) -> BoundingBox {
        BoundingBox::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }

    /// Whether `min <= max` holds on both axes.
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        if self.is_valid() {
            self.width() * self.height()
        } else {
            0.0
        }
    }

    /// Smallest box covering both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Overlap test. Boxes that only touch along an edge or a corner intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Area by which this box grows when it must also cover `candidate`.
    pub fn enlargement_area(&self, candidate: &BoundingBox) -> f64 {
        self.union(candidate).area() - self.area()
    }

    pub fn contains_point(&self, east: f64, north: f64) -> bool {
        east >= self.min_x && east <= self.max_x && north >= self.min_y && north <= self.max_y
    }
}
