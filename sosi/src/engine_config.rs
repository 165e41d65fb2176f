//! Configuration of a selection engine.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::{ErrorKind, SosiError, SosiResult};
use crate::selection::MAX_PRIORITIES;

/// Default number of entities between two cancellation polls.
pub const DEFAULT_CANCEL_POLL_INTERVAL: usize = 1;

/// Shared engine settings.
///
/// Cloning is cheap and clones share state. Settings are frozen once an
/// engine has been built from the configuration.
#[derive(Clone)]
pub struct EngineConfig {
    inner: Arc<EngineConfigInner>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        EngineConfig {
            inner: Arc::new(EngineConfigInner::new()),
        }
    }

    /// How many groups (or coordinates) a sweep handles between cancel polls.
    pub fn cancel_poll_interval(&self) -> usize {
        self.inner.cancel_poll_interval.load(Ordering::Relaxed)
    }

    pub fn set_cancel_poll_interval(&self, interval: usize) -> SosiResult<()> {
        self.inner.check_not_frozen("Cancel poll interval")?;
        if interval == 0 {
            log::error!("Cancel poll interval must be at least 1");
            return Err(SosiError::new(
                "Cancel poll interval must be at least 1",
                ErrorKind::InvalidConfiguration,
            ));
        }
        self.inner
            .cancel_poll_interval
            .store(interval, Ordering::Relaxed);
        Ok(())
    }

    /// Whether rule loading stops at the first malformed rule.
    pub fn stop_on_first_error(&self) -> bool {
        self.inner.stop_on_first_error.load(Ordering::Relaxed)
    }

    pub fn set_stop_on_first_error(&self, stop: bool) -> SosiResult<()> {
        self.inner.check_not_frozen("Stop-on-first-error")?;
        self.inner.stop_on_first_error.store(stop, Ordering::Relaxed);
        Ok(())
    }

    /// Number of priority buckets a rule set may use.
    pub fn max_priorities(&self) -> usize {
        MAX_PRIORITIES
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::Relaxed)
    }

    pub(crate) fn freeze(&self) {
        self.inner.frozen.store(true, Ordering::Relaxed);
    }
}

struct EngineConfigInner {
    frozen: AtomicBool,
    cancel_poll_interval: AtomicUsize,
    stop_on_first_error: AtomicBool,
}

impl EngineConfigInner {
    fn new() -> Self {
        EngineConfigInner {
            frozen: AtomicBool::from(false),
            cancel_poll_interval: AtomicUsize::from(DEFAULT_CANCEL_POLL_INTERVAL),
            stop_on_first_error: AtomicBool::from(false),
        }
    }

    fn check_not_frozen(&self, setting: &str) -> SosiResult<()> {
        if self.frozen.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after the engine is built", setting);
            return Err(SosiError::new(
                &format!("{} cannot be changed after the engine is built", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
