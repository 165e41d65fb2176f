use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A named group of rules that can be switched off together.
///
/// Clones share the same flag, so every rule referencing a layer sees a
/// toggle immediately.
#[derive(Clone)]
pub struct Layer {
    inner: Arc<LayerInner>,
}

struct LayerInner {
    name: String,
    active: AtomicBool,
}

impl Layer {
    /// Creates an active layer. The name is stored uppercased.
    pub fn new(name: &str) -> Self {
        Layer {
            inner: Arc::new(LayerInner {
                name: name.to_uppercase(),
                active: AtomicBool::new(true),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.inner.active.store(active, Ordering::Relaxed);
    }

    /// Whether both handles refer to the same layer.
    pub fn same_as(&self, other: &Layer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl Debug for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.inner.name)
            .field("active", &self.is_active())
            .finish()
    }
}
