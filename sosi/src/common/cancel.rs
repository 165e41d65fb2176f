/// Cooperative cancellation hook polled by long sweeps.
///
/// Sweeps poll between entities, so cancellation takes effect at the next
/// group (or coordinate) boundary, never in the middle of one.
pub trait CancelCheck {
    fn is_cancelled(&mut self) -> bool;
}

impl<F> CancelCheck for F
where
    F: FnMut() -> bool,
{
    fn is_cancelled(&mut self) -> bool {
        self()
    }
}

/// A hook that never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl CancelCheck for NeverCancel {
    fn is_cancelled(&mut self) -> bool {
        false
    }
}

/// Polls the wrapped hook only every `interval` calls.
pub(crate) struct PollGate<'a, C: CancelCheck + ?Sized> {
    hook: &'a mut C,
    interval: usize,
    ticks: usize,
}

impl<'a, C: CancelCheck + ?Sized> PollGate<'a, C> {
    pub(crate) fn new(hook: &'a mut C, interval: usize) -> Self {
        PollGate {
            hook,
            interval: interval.max(1),
            ticks: 0,
        }
    }

    pub(crate) fn tick(&mut self) -> bool {
        self.ticks += 1;
        if self.ticks % self.interval == 0 {
            self.hook.is_cancelled()
        } else {
            false
        }
    }
}
