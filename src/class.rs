use crate::executor::{Queue, runtime};
use derive_more::Display;

/// Named concurrency pool that work is submitted to.
///
/// The four priority classes resolve to process-wide concurrent pools, so
/// every submission to, say, [`ExecutionClass::Utility`] shares one set of
/// workers. [`ExecutionClass::Main`] resolves to the single process-wide
/// serial queue: one thread, strict FIFO, safe to submit to from anywhere.
/// [`ExecutionClass::Custom`] wraps a caller-built [`Queue`] verbatim.
#[derive(Debug, Display, Clone)]
pub enum ExecutionClass {
    /// Work the user is actively waiting on, such as input handling.
    #[display("interactive")]
    Interactive,
    /// Work the user started and expects results from shortly.
    #[display("initiated")]
    Initiated,
    /// Long-running work with user-visible progress.
    #[display("utility")]
    Utility,
    /// Maintenance work nobody is waiting on.
    #[display("background")]
    Background,
    /// The shared serial queue.
    #[display("main")]
    Main,
    /// A caller-supplied queue.
    #[display("custom({_0})")]
    Custom(Queue),
}

impl ExecutionClass {
    /// Resolve the queue backing this class.
    ///
    /// Built-in classes start lazily on first resolution; later calls return
    /// handles to the same pools.
    #[must_use]
    pub fn queue(&self) -> Queue {
        let runtime = runtime();
        match self {
            Self::Interactive => runtime.interactive.clone(),
            Self::Initiated => runtime.initiated.clone(),
            Self::Utility => runtime.utility.clone(),
            Self::Background => runtime.background.clone(),
            Self::Main => runtime.main.clone(),
            Self::Custom(queue) => queue.clone(),
        }
    }

    /// Whether the calling thread is one of this class's workers.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.queue().is_current()
    }
}
