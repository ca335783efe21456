use crate::{class::ExecutionClass, types::WaitResult};
use core::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use parking_lot::{Condvar, Mutex};
use std::{sync::Arc, time::Instant};
use tracing::trace;

/// Waitable barrier over independently submitted work.
///
/// Every [`Cohort::enter`] must be matched by exactly one
/// [`Cohort::leave`]; [`Cohort::wait`] returns once the two balance out.
/// Members may run on different classes and finish in any order.
///
/// A cohort is reusable for a later wave once `wait` has returned, but
/// overlapping waves on one cohort are not told apart: a waiter from the
/// first wave also waits for the second. Sequence waves externally.
#[derive(Debug, Clone, Default)]
pub struct Cohort(Arc<Inner>);

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    lock: Mutex<()>,
    drained: Condvar,
}

/// Cohort membership held for the guard's lifetime; leaves on drop.
#[derive(Debug)]
#[must_use = "dropping the guard leaves the cohort immediately"]
pub struct CohortGuard(Cohort);

impl Drop for CohortGuard {
    fn drop(&mut self) {
        self.0.leave();
    }
}

impl Cohort {
    /// Empty cohort.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one more outstanding member.
    pub fn enter(&self) {
        self.0.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Mark one outstanding member as finished.
    ///
    /// # Panics
    /// If called more times than [`Cohort::enter`].
    pub fn leave(&self) {
        let Inner {
            pending,
            lock,
            drained,
        } = &*self.0;
        let previous = pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| count.checked_sub(1))
            .unwrap_or_else(|_| panic!("Cohort::leave called without a matching enter"));
        if previous == 1 {
            // Taking the lock orders this wakeup after any waiter's check.
            drop(lock.lock());
            drained.notify_all();
        }
    }

    /// Enter now and leave when the returned guard drops.
    pub fn guard(&self) -> CohortGuard {
        self.enter();
        CohortGuard(self.clone())
    }

    /// Number of members that entered and have not left yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.0.pending.load(Ordering::Acquire)
    }

    /// Run `action` on `class` as a member of this cohort.
    ///
    /// The cohort is entered before this returns and left when the action
    /// finishes, including when it panics.
    pub fn submit(&self, class: &ExecutionClass, action: impl FnOnce() + Send + 'static) {
        let guard = self.guard();
        let queue = class.queue();
        trace!(queue = %queue, "submitting cohort member");
        queue.spawn(move || {
            let _guard = guard;
            action();
        });
    }

    /// Block until every member has left or `timeout` elapses (`None` waits
    /// indefinitely). Does not reset the cohort.
    ///
    /// The same serial-queue deadlock hazard as [`crate::WorkItem::wait`]
    /// applies when members are queued behind the waiting thread.
    pub fn wait(&self, timeout: Option<Duration>) -> WaitResult {
        let Inner {
            pending,
            lock,
            drained,
        } = &*self.0;
        let is_drained = || pending.load(Ordering::Acquire) == 0;
        if is_drained() {
            return WaitResult::Completed;
        }
        if timeout.is_some_and(|timeout| timeout.is_zero()) {
            return WaitResult::TimedOut;
        }
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut guard = lock.lock();
        while !is_drained() {
            match deadline {
                None => drained.wait(&mut guard),
                Some(deadline) => {
                    if drained.wait_until(&mut guard, deadline).timed_out() {
                        return if is_drained() {
                            WaitResult::Completed
                        } else {
                            WaitResult::TimedOut
                        };
                    }
                }
            }
        }
        WaitResult::Completed
    }
}
