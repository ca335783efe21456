use crate::{
    class::ExecutionClass,
    sync::*,
    types::{OutputSlot, WaitResult},
    utils::panic_message,
    work_item::{WorkItem, WorkState},
};
use core::time::Duration;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};
use thiserror::Error;
use tracing::trace;

/// Why a task's output is not available.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TaskError {
    /// The action has not finished yet.
    #[error("task has not completed yet")]
    Pending,
    /// A bounded wait gave up before the action finished.
    #[error("timed out waiting for task")]
    TimedOut,
    /// The task, or a predecessor in its chain, was cancelled before it ran.
    #[error("task was cancelled")]
    Cancelled,
    /// A chained task was performed by hand before its predecessor
    /// completed, so it had no input to run on.
    #[error("task was performed before its predecessor completed")]
    Premature,
    /// The action, or a predecessor in its chain, panicked.
    #[error("task panicked: {message}")]
    Panicked {
        /// Message carried by the panic payload.
        message: String,
    },
}

/// Handle to one submitted action and its eventual output.
///
/// Tasks are created by [`submit`] and extended with [`Task::chain`]. The
/// handle is cheap to clone; clones share the work item and output slot.
#[must_use = "a task can be dropped, but its output is then unreachable"]
pub struct Task<T> {
    work: WorkItem,
    output: Arc<OutputSlot<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            work: self.work.clone(),
            output: Arc::clone(&self.output),
        }
    }
}

impl<T> core::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task").field("work", &self.work).finish_non_exhaustive()
    }
}

/// Schedule `action` on `class`, after `delay` if given (counted from now).
///
/// Returns immediately; the action may not have run yet. A panic inside the
/// action is caught on the worker and surfaces through [`Task::result`] and
/// [`Task::join`].
pub fn submit<T, F>(class: &ExecutionClass, delay: Option<Duration>, action: F) -> Task<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let task = Task::deferred(action);
    let queue = class.queue();
    trace!(queue = %queue, ?delay, "submitting task");
    queue.execute_after(delay, &task.work);
    task
}

impl<T: Send + Sync + 'static> Task<T> {
    /// Build a task without scheduling it.
    ///
    /// Nothing runs until its work item is handed to a queue with
    /// [`crate::Queue::execute`] or performed directly via
    /// [`Task::work_item`].
    pub fn deferred(action: impl FnOnce() -> T + Send + 'static) -> Self {
        let output = Arc::new(OutputSlot::new(None));
        let slot = Arc::clone(&output);
        let work = WorkItem::new(move || {
            let result = capture(action);
            // SAFETY: only this work item writes the slot, and it performs once.
            unsafe { publish(&slot, result) };
        });
        Self { work, output }
    }

    /// Schedule `continuation` on `class` once this task has completed,
    /// after `delay` if given (counted from completion).
    ///
    /// The continuation receives this task's output. If this task panicked,
    /// the continuation is skipped and the new task carries the same error.
    /// If this task is cancelled before it runs, the new task is cancelled
    /// too and never starts. Performing the new task's work item by hand
    /// before this one completes leaves it with [`TaskError::Premature`].
    ///
    /// Several continuations may chain off one task; they are scheduled in
    /// registration order but run independently.
    pub fn chain<U, F>(&self, class: &ExecutionClass, delay: Option<Duration>, continuation: F) -> Task<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
    {
        let input = Arc::clone(&self.output);
        let output = Arc::new(OutputSlot::new(None));
        let slot = Arc::clone(&output);
        // Raised from the predecessor's notify list once its output is published.
        let ready = Arc::new(AtomicBool::new(false));
        let armed = Arc::clone(&ready);
        let work = WorkItem::new(move || {
            let result = if armed.load(Ordering::Acquire) {
                // SAFETY: `ready` is stored with `Release` after the
                // predecessor published its output.
                match unsafe { read_published(&input) } {
                    Some(Ok(value)) => capture(|| continuation(value)),
                    Some(Err(err)) => Err(err.clone()),
                    None => Err(TaskError::Premature),
                }
            } else {
                trace!("chained task performed before its predecessor completed");
                Err(TaskError::Premature)
            };
            // SAFETY: only this work item writes the slot, and it performs once.
            unsafe { publish(&slot, result) };
        });
        let queue = class.queue();
        trace!(queue = %queue, ?delay, "chaining task");
        let scheduled = work.clone();
        self.work.notify_dependent(
            &work,
            Box::new(move || {
                ready.store(true, Ordering::Release);
                queue.execute_after(delay, &scheduled);
            }),
        );
        Task { work, output }
    }
}

impl<T> Task<T> {
    /// Cancel the task if it has not started yet.
    ///
    /// Continuations chained off it are cancelled as well. Has no effect on a
    /// running or completed task, and never affects predecessors. Returns
    /// whether the cancellation took effect.
    pub fn cancel(&self) -> bool {
        self.work.cancel()
    }

    /// Block until the task completes, is cancelled, or `timeout` elapses.
    ///
    /// See [`WorkItem::wait`] for the serial-queue deadlock hazard.
    pub fn wait(&self, timeout: Option<Duration>) -> WaitResult {
        self.work.wait(timeout)
    }

    /// Output of a successfully completed action; `None` while pending, or
    /// if the task was cancelled or panicked.
    #[must_use]
    pub fn output(&self) -> Option<&T> {
        self.result().ok()
    }

    /// Non-blocking view of the task's outcome.
    ///
    /// # Errors
    /// [`TaskError::Pending`] until the action has finished,
    /// [`TaskError::Cancelled`] if it never will, or the action's failure.
    pub fn result(&self) -> Result<&T, TaskError> {
        match self.work.state() {
            WorkState::Pending | WorkState::Running => Err(TaskError::Pending),
            WorkState::Cancelled => Err(TaskError::Cancelled),
            WorkState::Completed => {
                // SAFETY: the `Acquire` load observed completion, which the work
                // item published with `Release` after writing the slot.
                match unsafe { read_published(&self.output) } {
                    Some(result) => result.as_ref().map_err(Clone::clone),
                    None => Err(TaskError::Pending),
                }
            }
        }
    }

    /// Wait for the task, then return its output or failure.
    ///
    /// # Errors
    /// [`TaskError::TimedOut`] if `timeout` elapsed first, otherwise as
    /// [`Task::result`].
    pub fn join(&self, timeout: Option<Duration>) -> Result<&T, TaskError> {
        match self.wait(timeout) {
            WaitResult::TimedOut => Err(TaskError::TimedOut),
            WaitResult::Completed | WaitResult::Cancelled => self.result(),
        }
    }

    /// Current lifecycle state of the underlying work item.
    #[must_use]
    pub fn state(&self) -> WorkState {
        self.work.state()
    }

    /// The underlying work item.
    #[must_use]
    pub fn work_item(&self) -> &WorkItem {
        &self.work
    }
}

fn capture<T>(action: impl FnOnce() -> T) -> Result<T, TaskError> {
    catch_unwind(AssertUnwindSafe(action)).map_err(|payload| TaskError::Panicked {
        message: panic_message(payload.as_ref()),
    })
}

/// # Safety
///
/// Must be called at most once per slot, by the work item that owns it, and
/// before that item publishes completion.
unsafe fn publish<T>(slot: &OutputSlot<T>, result: Result<T, TaskError>) {
    // SAFETY: no reader can reach the slot before completion is published,
    // and there is exactly one writer.
    unsafe {
        slot.get_mut().with(|ptr| *ptr = Some(result));
    }
}

/// # Safety
///
/// The owning work item must have completed, and the caller must
/// happen-after that completion (an `Acquire` load of the completed state,
/// or of a flag raised from the item's notify list).
unsafe fn read_published<T>(slot: &OutputSlot<T>) -> Option<&Result<T, TaskError>> {
    // SAFETY: the slot was written before completion and is never written
    // again, so shared reads cannot race.
    unsafe { slot.get().with(|ptr| (*ptr).as_ref()) }
}
