mod queue;
mod serial;
mod timer;

pub use crate::executor::queue::{Queue, QueueError};
use crate::{class::ExecutionClass, config, types::Job, utils::panic_message};
use once_cell::sync::Lazy;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, error};

/// Queues backing the built-in execution classes.
///
/// Started once per process, on first resolution of any built-in class.
#[derive(Debug)]
pub(crate) struct Runtime {
    pub(crate) interactive: Queue,
    pub(crate) initiated: Queue,
    pub(crate) utility: Queue,
    pub(crate) background: Queue,
    pub(crate) main: Queue,
}

static RUNTIME: Lazy<Runtime> = Lazy::new(Runtime::start);

pub(crate) fn runtime() -> &'static Runtime {
    &RUNTIME
}

impl Runtime {
    /// # Panics
    /// If a worker thread cannot be spawned. Class resolution has no error
    /// path, the same as rayon's global pool.
    fn start() -> Self {
        let config = config::current();
        let prefix = config.thread_name_prefix();
        let pool = |class: ExecutionClass| {
            let threads = config.threads(&class).unwrap_or_default();
            Queue::concurrent(format!("{prefix}-{class}"), threads)
                .unwrap_or_else(|err| panic!("failed to start the {class} pool: {err}"))
        };
        let runtime = Self {
            interactive: pool(ExecutionClass::Interactive),
            initiated: pool(ExecutionClass::Initiated),
            utility: pool(ExecutionClass::Utility),
            background: pool(ExecutionClass::Background),
            main: Queue::serial(format!("{prefix}-main"))
                .unwrap_or_else(|err| panic!("failed to start the main queue: {err}")),
        };
        debug!(prefix, "execution classes started");
        runtime
    }
}

/// Run a job, containing any panic so the worker thread survives it.
pub(crate) fn run_job(job: Job, queue: &str) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
        error!(
            queue,
            panic = %panic_message(payload.as_ref()),
            "job panicked"
        );
    }
}
