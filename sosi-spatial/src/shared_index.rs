use std::sync::Arc;

use parking_lot::Mutex;

use crate::SpatialIndex;

/// A [`SpatialIndex`] behind one exclusive lock, for sharing between threads.
///
/// The tree is not built for fine-grained concurrent mutation, so readers
/// and writers alike take the same lock.
#[derive(Clone, Default)]
pub struct SharedSpatialIndex {
    inner: Arc<Mutex<SpatialIndex>>,
}

impl SharedSpatialIndex {
    pub fn new(index: SpatialIndex) -> Self {
        SharedSpatialIndex {
            inner: Arc::new(Mutex::new(index)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&SpatialIndex) -> R) -> R {
        let guard = self.inner.lock();
        f(&guard)
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut SpatialIndex) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}
