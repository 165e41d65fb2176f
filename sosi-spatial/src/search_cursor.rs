use sosi::common::{GroupRef, LayerMask};
use sosi::store::restore_current_group;

use crate::rtree::{SpatialError, SpatialIndex, SpatialResult};
use crate::{BoundingBox, SpatialStore};

/// Default window-to-extent ratio below which [`SearchMethod::Auto`] uses the index.
pub const DEFAULT_AUTO_THRESHOLD: f64 = 0.1;

/// How a [`SearchCursor`] finds candidate groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMethod {
    /// Test the stored box of every group in the requested layers, in store order.
    Sequential,
    /// Descend the R-tree.
    Indexed,
    /// Use the index for narrow windows and scan otherwise.
    #[default]
    Auto,
}

/// Iteration state for one geographic search.
///
/// `find_first` materializes every hit into an ordered result list and
/// `find_next` walks that list. The list is a snapshot: groups indexed or
/// removed after `find_first` are not seen until the next `find_first`.
/// The cursor borrows the index, so the index cannot change while it lives.
///
/// # Examples
///
/// ```rust
/// use sosi::common::LayerMask;
/// use sosi::store::{MemoryGroupStore, StoredGroup};
/// use sosi_spatial::{BoundingBox, SearchCursor, SearchMethod, SpatialIndex, SpatialStore};
///
/// let mut store = MemoryGroupStore::new();
/// let near = store.add_group(1, StoredGroup::point().with_coordinates(&[(1.0, 1.0)]));
/// store.add_group(1, StoredGroup::point().with_coordinates(&[(50.0, 50.0)]));
///
/// let mut index = SpatialIndex::new();
/// index.insert(near, store.group_box(near).unwrap());
///
/// let mut cursor = SearchCursor::new(&index, SearchMethod::Sequential);
/// let window = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
/// assert_eq!(cursor.find_first(&store, &window, LayerMask::ALL), Some(near));
/// assert_eq!(cursor.find_next(), None);
/// ```
#[derive(Debug, Clone)]
pub struct SearchCursor<'a> {
    index: &'a SpatialIndex,
    method: SearchMethod,
    auto_threshold: f64,
    used_method: Option<SearchMethod>,
    results: Vec<GroupRef>,
    position: usize,
}

impl<'a> SearchCursor<'a> {
    pub fn new(index: &'a SpatialIndex, method: SearchMethod) -> Self {
        SearchCursor {
            index,
            method,
            auto_threshold: DEFAULT_AUTO_THRESHOLD,
            used_method: None,
            results: Vec::new(),
            position: 0,
        }
    }

    /// Sets the ratio used by [`SearchMethod::Auto`]. Must be positive.
    pub fn with_auto_threshold(mut self, ratio: f64) -> SpatialResult<Self> {
        if !(ratio.is_finite() && ratio > 0.0) {
            log::error!("Auto search threshold must be a positive ratio, got {}", ratio);
            return Err(SpatialError::InvalidOperation(format!(
                "Auto search threshold must be a positive ratio, got {}",
                ratio
            )));
        }
        self.auto_threshold = ratio;
        Ok(self)
    }

    pub fn method(&self) -> SearchMethod {
        self.method
    }

    /// Method the last `find_first` actually ran with.
    pub fn used_method(&self) -> Option<SearchMethod> {
        self.used_method
    }

    /// Hits of the last `find_first`, in result order.
    pub fn results(&self) -> &[GroupRef] {
        &self.results
    }

    /// Starts a new search and returns its first hit.
    pub fn find_first<S: SpatialStore + ?Sized>(
        &mut self,
        store: &S,
        window: &BoundingBox,
        layers: LayerMask,
    ) -> Option<GroupRef> {
        let method = self.resolve(store, window);
        self.results = match method {
            SearchMethod::Indexed => self.index.query_in_layers(window, layers, store).collect(),
            _ => Self::scan(store, window, layers),
        };
        self.start(method)
    }

    /// Like [`find_first`](Self::find_first), restricted to polygons that
    /// were indexed with a reference box.
    pub fn find_first_flate<S: SpatialStore + ?Sized>(
        &mut self,
        store: &S,
        window: &BoundingBox,
        layers: LayerMask,
    ) -> Option<GroupRef> {
        let method = self.resolve(store, window);
        let index = self.index;
        let is_candidate = |group: &GroupRef| index.has_reference_box(*group) && store.is_flate(*group);
        self.results = match method {
            SearchMethod::Indexed => index
                .query_in_layers(window, layers, store)
                .filter(|g| is_candidate(g))
                .collect(),
            _ if !window.is_valid() => Vec::new(),
            _ => store
                .groups(layers)
                .into_iter()
                .filter(|g| is_candidate(g))
                .filter(|g| index.group_box(*g).is_some_and(|b| b.intersects(window)))
                .collect(),
        };
        self.start(method)
    }

    /// Continues from the previous hit. `None` once the results are exhausted.
    pub fn find_next(&mut self) -> Option<GroupRef> {
        let hit = self.results.get(self.position).copied();
        if hit.is_some() {
            self.position += 1;
        }
        hit
    }

    /// Marks every hit in the store's found set and returns the hit count.
    ///
    /// The found set is cleared first. The current group is left unchanged.
    pub fn find_all<S: SpatialStore + ?Sized>(
        &mut self,
        store: &mut S,
        window: &BoundingBox,
        layers: LayerMask,
    ) -> SpatialResult<usize> {
        let saved = store.current_group();
        store.clear_found();
        self.find_first(&*store, window, layers);
        for group in &self.results {
            store.mark_found(*group);
        }
        self.position = self.results.len();
        restore_current_group(store, saved)?;
        log::debug!("Geographic search in {} found {} groups", window, self.results.len());
        Ok(self.results.len())
    }

    fn start(&mut self, method: SearchMethod) -> Option<GroupRef> {
        self.used_method = Some(method);
        self.position = 0;
        self.find_next()
    }

    fn resolve<S: SpatialStore + ?Sized>(&self, store: &S, window: &BoundingBox) -> SearchMethod {
        if self.method != SearchMethod::Auto {
            return self.method;
        }
        if self.index.is_empty() {
            return SearchMethod::Sequential;
        }
        let method = match store.base_extent() {
            None => SearchMethod::Indexed,
            Some(extent) => {
                if window.width() < extent.width() * self.auto_threshold
                    || window.height() < extent.height() * self.auto_threshold
                {
                    SearchMethod::Indexed
                } else {
                    SearchMethod::Sequential
                }
            }
        };
        log::debug!("Search method for window {}: {:?}", window, method);
        method
    }

    fn scan<S: SpatialStore + ?Sized>(
        store: &S,
        window: &BoundingBox,
        layers: LayerMask,
    ) -> Vec<GroupRef> {
        if !window.is_valid() {
            return Vec::new();
        }
        store
            .groups(layers)
            .into_iter()
            .filter(|group| store.group_box(*group).is_some_and(|b| b.intersects(window)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use sosi::store::{BoundaryMember, GroupStore, MemoryGroupStore, StoredGroup};

    fn indexed_store(groups: &[&[(f64, f64)]]) -> (MemoryGroupStore, SpatialIndex, Vec<GroupRef>) {
        let mut store = MemoryGroupStore::new();
        let mut index = SpatialIndex::new();
        let mut refs = Vec::new();
        for coordinates in groups {
            let group = store.add_group(1, StoredGroup::line().with_coordinates(coordinates));
            index.insert(group, store.group_box(group).unwrap());
            refs.push(group);
        }
        (store, index, refs)
    }

    #[test]
    fn test_find_first_and_next() {
        let (store, index, refs) = indexed_store(&[
            &[(0.0, 0.0), (1.0, 1.0)],
            &[(10.0, 10.0)],
            &[(1.0, 0.0), (2.0, 0.5)],
        ]);
        let mut cursor = SearchCursor::new(&index, SearchMethod::Sequential);
        let window = BoundingBox::new(0.0, 0.0, 3.0, 3.0);

        assert_eq!(cursor.find_first(&store, &window, LayerMask::ALL), Some(refs[0]));
        assert_eq!(cursor.find_next(), Some(refs[2]));
        assert_eq!(cursor.find_next(), None);
        assert_eq!(cursor.find_next(), None);

        assert_eq!(cursor.find_first(&store, &window, LayerMask::ALL), Some(refs[0]));
        assert_eq!(cursor.used_method(), Some(SearchMethod::Sequential));
    }

    #[test]
    fn test_find_next_before_first() {
        let index = SpatialIndex::new();
        let mut cursor = SearchCursor::new(&index, SearchMethod::Indexed);
        assert_eq!(cursor.find_next(), None);
        assert_eq!(cursor.used_method(), None);
    }

    #[test]
    fn test_sequential_matches_indexed() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut store = MemoryGroupStore::new();
        let mut index = SpatialIndex::new();
        for _ in 0..200 {
            let x = rng.gen_range(0.0..500.0);
            let y = rng.gen_range(0.0..500.0);
            let layer = if rng.gen_bool(0.3) { LayerMask::BACKGROUND } else { LayerMask::FOREGROUND };
            let group = store.add_group(
                1,
                StoredGroup::line()
                    .in_layer(layer)
                    .with_coordinates(&[(x, y), (x + rng.gen_range(0.0..20.0), y + rng.gen_range(0.0..20.0))]),
            );
            index.insert(group, store.group_box(group).unwrap());
        }

        let mut sequential = SearchCursor::new(&index, SearchMethod::Sequential);
        let mut indexed = SearchCursor::new(&index, SearchMethod::Indexed);
        for _ in 0..40 {
            let x = rng.gen_range(-50.0..500.0);
            let y = rng.gen_range(-50.0..500.0);
            let window = BoundingBox::new(x, y, x + rng.gen_range(0.0..120.0), y + rng.gen_range(0.0..120.0));
            for layers in [LayerMask::ALL, LayerMask::FOREGROUND, LayerMask::BACKGROUND] {
                sequential.find_first(&store, &window, layers);
                indexed.find_first(&store, &window, layers);
                let mut a = sequential.results().to_vec();
                let mut b = indexed.results().to_vec();
                a.sort();
                b.sort();
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_inverted_window_finds_nothing() {
        let (store, index, _) = indexed_store(&[&[(0.0, 0.0)]]);
        let window = BoundingBox::new(1.0, 1.0, -1.0, -1.0);
        for method in [SearchMethod::Sequential, SearchMethod::Indexed, SearchMethod::Auto] {
            let mut cursor = SearchCursor::new(&index, method);
            assert_eq!(cursor.find_first(&store, &window, LayerMask::ALL), None);
        }
    }

    #[test]
    fn test_auto_method_selection() {
        let (mut store, index, _) = indexed_store(&[&[(0.0, 0.0), (1000.0, 1000.0)]]);
        let mut cursor = SearchCursor::new(&index, SearchMethod::Auto);

        cursor.find_first(&store, &BoundingBox::new(0.0, 0.0, 500.0, 500.0), LayerMask::ALL);
        assert_eq!(cursor.used_method(), Some(SearchMethod::Indexed));

        store.set_base_extent([0.0, 0.0, 1000.0, 1000.0]);
        cursor.find_first(&store, &BoundingBox::new(0.0, 0.0, 500.0, 500.0), LayerMask::ALL);
        assert_eq!(cursor.used_method(), Some(SearchMethod::Sequential));
        cursor.find_first(&store, &BoundingBox::new(0.0, 0.0, 50.0, 900.0), LayerMask::ALL);
        assert_eq!(cursor.used_method(), Some(SearchMethod::Indexed));

        let mut wide = SearchCursor::new(&index, SearchMethod::Auto)
            .with_auto_threshold(0.6)
            .unwrap();
        wide.find_first(&store, &BoundingBox::new(0.0, 0.0, 500.0, 500.0), LayerMask::ALL);
        assert_eq!(wide.used_method(), Some(SearchMethod::Indexed));

        let empty = SpatialIndex::new();
        let mut cursor = SearchCursor::new(&empty, SearchMethod::Auto);
        cursor.find_first(&store, &BoundingBox::new(0.0, 0.0, 1.0, 1.0), LayerMask::ALL);
        assert_eq!(cursor.used_method(), Some(SearchMethod::Sequential));
    }

    #[test]
    fn test_invalid_auto_threshold() {
        let index = SpatialIndex::new();
        assert!(SearchCursor::new(&index, SearchMethod::Auto).with_auto_threshold(0.0).is_err());
        assert!(SearchCursor::new(&index, SearchMethod::Auto).with_auto_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_find_all_marks_and_restores() {
        let (mut store, index, refs) = indexed_store(&[
            &[(0.0, 0.0)],
            &[(3.0, 3.0)],
            &[(40.0, 40.0)],
        ]);
        store.select_group(refs[2]).unwrap();
        store.mark_found(refs[2]);

        let mut cursor = SearchCursor::new(&index, SearchMethod::Indexed);
        let count = cursor
            .find_all(&mut store, &BoundingBox::new(-5.0, -5.0, 5.0, 5.0), LayerMask::ALL)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.found_groups(), vec![refs[0], refs[1]]);
        assert_eq!(store.current_group(), Some(refs[2]));
        assert_eq!(cursor.find_next(), None);
    }

    #[test]
    fn test_find_first_flate() {
        let mut store = MemoryGroupStore::new();
        let edge = store.add_group(1, StoredGroup::line().with_coordinates(&[(0.0, 0.0), (4.0, 0.0)]));
        let flate = store.add_group(
            1,
            StoredGroup::flate()
                .with_coordinates(&[(2.0, 1.0)])
                .with_boundary_member(BoundaryMember::outer(edge)),
        );
        let mut index = SpatialIndex::new();
        index.insert(edge, store.group_box(edge).unwrap());
        index.index_flate(&store, flate).unwrap();

        let window = BoundingBox::new(0.0, 0.0, 3.0, 3.0);
        for method in [SearchMethod::Sequential, SearchMethod::Indexed] {
            let mut cursor = SearchCursor::new(&index, method);
            assert_eq!(cursor.find_first_flate(&store, &window, LayerMask::ALL), Some(flate));
            assert_eq!(cursor.find_next(), None);
        }
    }
}
