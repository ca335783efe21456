use crate::{
    sync::{AtomicU8, Latch, Mutex, Ordering},
    types::{Job, WaitResult},
    utils::panic_message,
};
use core::{fmt, time::Duration};
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use tracing::{error, trace};

/// Lifecycle of a [`WorkItem`].
///
/// `Pending` moves to either `Cancelled` (via [`WorkItem::cancel`]) or
/// `Running` (when a queue drains it), and `Running` always ends in
/// `Completed`. Whichever of cancel and drain wins the race decides.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[repr(u8)]
pub enum WorkState {
    /// Not yet drained; still cancellable.
    #[display("pending")]
    Pending = 0,
    /// The action is executing.
    #[display("running")]
    Running = 1,
    /// The action returned and the notify list has been fired.
    #[display("completed")]
    Completed = 2,
    /// Cancelled before it began; the action will never run.
    #[display("cancelled")]
    Cancelled = 3,
}

impl WorkState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Cancelled,
            _ => unreachable!("WorkState::from_u8: {raw}"),
        }
    }
}

/// One-shot, cancellable unit of deferred work with a completion notify list.
///
/// Handles are cheap to clone and all refer to the same item. The action runs
/// at most once, however many times [`WorkItem::perform`] is called.
#[derive(Clone)]
pub struct WorkItem(Arc<Inner>);

struct Inner {
    state: AtomicU8,
    action: Mutex<Option<Job>>,
    /// Continuations registered via `notify`, in registration order. Locked
    /// whenever the state leaves `Pending`/`Running` so that registration
    /// and firing never miss each other.
    continuations: Mutex<Vec<Continuation>>,
    done: Latch,
}

struct Continuation {
    job: Job,
    /// Work item scheduled by `job`, cancelled in cascade instead of firing.
    dependent: Option<WorkItem>,
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkItem").field(&self.state()).finish()
    }
}

impl WorkItem {
    /// Wrap `action` into a pending work item. Nothing runs until a queue
    /// (or the caller) invokes [`WorkItem::perform`].
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        let action: Job = Box::new(action);
        Self(Arc::new(Inner {
            state: AtomicU8::new(WorkState::Pending as u8),
            action: Mutex::new(Some(action)),
            continuations: Mutex::new(Vec::new()),
            done: Latch::default(),
        }))
    }

    /// Current lifecycle state.
    ///
    /// Observing [`WorkState::Completed`] happens-after everything the action
    /// did.
    #[must_use]
    pub fn state(&self) -> WorkState {
        WorkState::from_u8(self.0.state.load(Ordering::Acquire))
    }

    /// Whether [`WorkItem::cancel`] won the race against the queue.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == WorkState::Cancelled
    }

    /// Run the action, then fire the notify list in registration order.
    ///
    /// No-op if the item was cancelled or has already been performed. A
    /// panicking action is logged and still counts as completed.
    pub fn perform(&self) {
        let Inner {
            state,
            action,
            continuations,
            done,
        } = &*self.0;
        if state
            .compare_exchange(
                WorkState::Pending as u8,
                WorkState::Running as u8,
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_err()
        {
            trace!(state = %self.state(), "skipping work item that is no longer pending");
            return;
        }
        let action = action.lock().take();
        if let Some(action) = action {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(action)) {
                error!(panic = %panic_message(payload.as_ref()), "work item action panicked");
            }
        }
        let fired = {
            let mut continuations = continuations.lock();
            // Everything the action wrote is published by this store.
            state.store(WorkState::Completed as u8, Ordering::Release);
            core::mem::take(&mut *continuations)
        };
        done.open();
        for Continuation { job, dependent: _ } in fired {
            fire(job);
        }
    }

    /// Cancel the item if it has not started yet.
    ///
    /// Once cancelled, the action never runs, the notify list never fires,
    /// and every dependent registered through chaining is cancelled as well.
    /// Returns whether this call did the cancelling; cancelling a running,
    /// completed, or already-cancelled item returns `false` and changes
    /// nothing.
    pub fn cancel(&self) -> bool {
        let Inner {
            state,
            action,
            continuations,
            done,
        } = &*self.0;
        if state
            .compare_exchange(
                WorkState::Pending as u8,
                WorkState::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_err()
        {
            return false;
        }
        trace!("work item cancelled");
        drop(action.lock().take());
        let abandoned = core::mem::take(&mut *continuations.lock());
        done.open();
        for Continuation { job, dependent } in abandoned {
            drop(job);
            if let Some(dependent) = dependent {
                dependent.cancel();
            }
        }
        true
    }

    /// Register `f` to run once the action has completed.
    ///
    /// Continuations fire in registration order on the thread that performed
    /// the item. Registering on an already completed item fires `f`
    /// immediately on the calling thread; registering on a cancelled item
    /// drops it.
    pub fn notify(&self, f: impl FnOnce() + Send + 'static) {
        self.register(Continuation {
            job: Box::new(f),
            dependent: None,
        });
    }

    /// Like [`WorkItem::notify`], but `job` schedules `dependent`, which is
    /// cancelled instead if this item is cancelled.
    pub(crate) fn notify_dependent(&self, dependent: &WorkItem, job: Job) {
        self.register(Continuation {
            job,
            dependent: Some(dependent.clone()),
        });
    }

    fn register(&self, continuation: Continuation) {
        let mut continuations = self.0.continuations.lock();
        match WorkState::from_u8(self.0.state.load(Ordering::Acquire)) {
            WorkState::Pending | WorkState::Running => continuations.push(continuation),
            WorkState::Completed => {
                drop(continuations);
                fire(continuation.job);
            }
            WorkState::Cancelled => {
                drop(continuations);
                if let Some(dependent) = continuation.dependent {
                    dependent.cancel();
                }
            }
        }
    }

    /// Block the calling thread until the item completes, is cancelled, or
    /// `timeout` elapses (`None` waits indefinitely).
    ///
    /// The timeout only bounds the wait; the work itself carries on.
    ///
    /// Waiting from a queue's own worker on an item queued behind it on a
    /// serial queue deadlocks: in particular, never wait on main-class work
    /// from the main queue.
    pub fn wait(&self, timeout: Option<Duration>) -> WaitResult {
        if !self.0.done.wait(timeout) {
            return WaitResult::TimedOut;
        }
        match self.state() {
            WorkState::Cancelled => WaitResult::Cancelled,
            WorkState::Completed => WaitResult::Completed,
            state @ (WorkState::Pending | WorkState::Running) => {
                unreachable!("WorkItem::wait: latch open in state {state}")
            }
        }
    }
}

fn fire(job: Job) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        error!(panic = %panic_message(payload.as_ref()), "work item continuation panicked");
    }
}
