//! Priority-classed work queues with chained tasks, cohorts and parallel
//! for-each.
//!
//! Work is submitted to an [`ExecutionClass`]: one of four shared concurrent
//! pools (interactive, initiated, utility, background), the process-wide
//! serial main queue, or a caller-built [`Queue`]. On top of that:
//! - [`submit`] returns a [`Task`] whose output can be read once it
//!   completes, waited for with a timeout, or fed into a continuation with
//!   [`Task::chain`]. A continuation never starts before its predecessor's
//!   action has returned, and cancelling a task that has not started also
//!   cancels everything chained off it.
//! - [`Cohort`] is a wait group over independently submitted work that may
//!   span several classes.
//! - [`for_each`] fires off `body(i)` for every index of a range.
//!
//! Every task wraps a [`WorkItem`]: a one-shot, cancellable action with a
//! notify list. The item publishes completion with a `Release` store after
//! the action wrote its output, and readers observe it with `Acquire`, so
//! output slots need no lock.
//!
//! ```no_run
//! use chainq::{ExecutionClass, submit};
//!
//! let task = submit(&ExecutionClass::Background, None, || 1)
//!     .chain(&ExecutionClass::Utility, None, |x| x + 1)
//!     .chain(&ExecutionClass::Background, None, |x| x * 2);
//! assert_eq!(task.join(None), Ok(&4));
//! ```
//!
//! Waiting blocks the calling thread. Waiting on work queued behind the
//! caller on a serial queue (for example main-class work waited on from the
//! main queue) deadlocks; this is not detected.

/// Execution classes and their resolution to queues.
pub mod class;
/// Wait groups over independently submitted work.
pub mod cohort;
/// Process-wide configuration of the built-in classes.
pub mod config;
mod debounce;
/// Queues, worker pools and the delay timer.
pub mod executor;
/// Fire-and-forget parallel iteration.
pub mod parallel;
mod sync;
/// Chained tasks with write-once outputs.
pub mod task;
/// Shared result types and the output cell primitive.
pub mod types;
mod utils;
/// Cancellable one-shot work items with completion notification.
pub mod work_item;

pub use crate::{
    class::ExecutionClass,
    cohort::{Cohort, CohortGuard},
    config::{ConfigError, RuntimeConfig, configure},
    debounce::Debouncer,
    executor::{Queue, QueueError},
    parallel::for_each,
    task::{Task, TaskError, submit},
    types::WaitResult,
    work_item::{WorkItem, WorkState},
};
