use crate::{
    executor::{run_job, serial::SerialQueue, timer::timer},
    types::Job,
    utils::panic_message,
    work_item::WorkItem,
};
use core::fmt;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::{
    io,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, error, trace};

/// Error returned when a queue's worker threads cannot be started.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueueError {
    /// The concurrent worker pool failed to build.
    #[error("failed to build worker pool `{label}`")]
    Pool {
        /// Label of the queue being built.
        label: String,
        /// Underlying rayon failure.
        #[source]
        source: ThreadPoolBuildError,
    },
    /// The serial queue's thread failed to spawn.
    #[error("failed to spawn serial queue thread `{label}`")]
    Thread {
        /// Label of the queue being built.
        label: String,
        /// Underlying spawn failure.
        #[source]
        source: io::Error,
    },
}

/// Cheap-to-clone handle to a queue of work.
///
/// Either a concurrent pool, where jobs may run in parallel on any of its
/// workers, or a serial queue, where jobs run one at a time on a single
/// thread in submission order. Clones share the same workers.
#[derive(Clone)]
pub struct Queue(Arc<QueueInner>);

struct QueueInner {
    label: Arc<str>,
    kind: QueueKind,
}

enum QueueKind {
    Concurrent(ThreadPool),
    Serial(SerialQueue),
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("label", &self.label())
            .field("serial", &self.is_serial())
            .finish()
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Queue {
    /// Start a concurrent pool with `threads` workers (`0` lets rayon pick
    /// one per CPU). Workers are named `{label}-{index}`.
    ///
    /// # Errors
    /// If the pool's threads cannot be spawned.
    pub fn concurrent(label: impl Into<String>, threads: usize) -> Result<Self, QueueError> {
        let label: Arc<str> = label.into().into();
        let thread_label = Arc::clone(&label);
        let panic_label = Arc::clone(&label);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |index| format!("{thread_label}-{index}"))
            .panic_handler(move |payload| {
                error!(
                    queue = %panic_label,
                    panic = %panic_message(payload.as_ref()),
                    "worker caught an escaped panic"
                );
            })
            .build()
            .map_err(|source| QueueError::Pool {
                label: label.to_string(),
                source,
            })?;
        debug!(queue = %label, threads = pool.current_num_threads(), "concurrent queue started");
        Ok(Self(Arc::new(QueueInner {
            label,
            kind: QueueKind::Concurrent(pool),
        })))
    }

    /// Start a serial queue drained by one thread named `label`.
    ///
    /// # Errors
    /// If the thread cannot be spawned.
    pub fn serial(label: impl Into<String>) -> Result<Self, QueueError> {
        let label: Arc<str> = label.into().into();
        let queue = SerialQueue::start(&label).map_err(|source| QueueError::Thread {
            label: label.to_string(),
            source,
        })?;
        debug!(queue = %label, "serial queue started");
        Ok(Self(Arc::new(QueueInner {
            label,
            kind: QueueKind::Serial(queue),
        })))
    }

    /// Label the queue was created with.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.0.label
    }

    /// Whether jobs run one at a time in submission order.
    #[must_use]
    pub fn is_serial(&self) -> bool {
        matches!(self.0.kind, QueueKind::Serial(_))
    }

    /// Whether both handles refer to the same workers.
    #[must_use]
    pub fn same_queue(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the calling thread is one of this queue's workers.
    #[must_use]
    pub fn is_current(&self) -> bool {
        match &self.0.kind {
            QueueKind::Concurrent(pool) => pool.current_thread_index().is_some(),
            QueueKind::Serial(queue) => queue.is_current(),
        }
    }

    /// Enqueue a fire-and-forget closure. Panics inside it are logged and
    /// contained.
    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        self.push(Box::new(job));
    }

    /// Enqueue a closure once `delay` has elapsed, counted from now.
    pub fn spawn_after(&self, delay: Option<Duration>, job: impl FnOnce() + Send + 'static) {
        self.push_after(delay, Box::new(job));
    }

    /// Enqueue a work item; it performs unless cancelled first.
    pub fn execute(&self, work: &WorkItem) {
        let work = work.clone();
        self.push(Box::new(move || work.perform()));
    }

    /// Enqueue a work item once `delay` has elapsed, counted from now.
    pub fn execute_after(&self, delay: Option<Duration>, work: &WorkItem) {
        let work = work.clone();
        self.push_after(delay, Box::new(move || work.perform()));
    }

    pub(crate) fn push(&self, job: Job) {
        let QueueInner { label, kind } = &*self.0;
        match kind {
            QueueKind::Concurrent(pool) => {
                let label = Arc::clone(label);
                pool.spawn_fifo(move || run_job(job, &label));
            }
            QueueKind::Serial(queue) => queue.push(job, label),
        }
    }

    pub(crate) fn push_after(&self, delay: Option<Duration>, job: Job) {
        let deadline = delay
            .filter(|delay| !delay.is_zero())
            .and_then(|delay| Instant::now().checked_add(delay));
        match deadline {
            None => self.push(job),
            Some(deadline) => {
                trace!(queue = %self.0.label, ?delay, "deferring job");
                let queue = self.clone();
                timer().schedule(deadline, Box::new(move || queue.push(job)));
            }
        }
    }
}
