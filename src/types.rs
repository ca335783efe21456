use crate::{sync::UnsafeCell, task::TaskError};
use derive_more::{Deref, DerefMut, Display};

/// A minimal `UnsafeCell` wrapper that is `Sync` when `T: Send + Sync`.
///
/// Used for write-once output slots: the owning work item writes the slot
/// exactly once before publishing completion with `Release`, and every reader
/// first observes that completion with `Acquire`.
#[derive(Debug, Deref, DerefMut)]
#[repr(transparent)]
pub(crate) struct SyncUnsafeCell<T>(UnsafeCell<T>);

unsafe impl<T: Send + Sync> Sync for SyncUnsafeCell<T> {}

impl<T> SyncUnsafeCell<T> {
    pub(crate) fn new(val: T) -> Self {
        Self(UnsafeCell::new(val))
    }
}

/// Write-once slot holding the outcome of a task's action.
pub(crate) type OutputSlot<T> = SyncUnsafeCell<Option<Result<T, TaskError>>>;

/// Type-erased deferred action.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Outcome of a bounded or unbounded wait.
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
#[must_use]
pub enum WaitResult {
    /// The awaited work finished running.
    #[display("completed")]
    Completed,
    /// The timeout elapsed first. The work itself is unaffected.
    #[display("timed out")]
    TimedOut,
    /// The awaited work was cancelled and will never run.
    #[display("cancelled")]
    Cancelled,
}

impl WaitResult {
    /// Whether the awaited work ran to completion.
    #[must_use]
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }

    /// Whether the wait gave up before the work finished.
    #[must_use]
    pub fn is_timed_out(self) -> bool {
        self == Self::TimedOut
    }
}
