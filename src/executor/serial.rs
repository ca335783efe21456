use crate::{executor::run_job, types::Job};
use crossbeam_channel::{Sender, unbounded};
use std::{
    io,
    thread::{self, ThreadId},
};
use tracing::{error, trace};

/// Strict FIFO queue drained by one dedicated thread.
///
/// The thread exits once every handle to the queue has been dropped and the
/// backlog is drained.
#[derive(Debug)]
pub(super) struct SerialQueue {
    sender: Sender<Job>,
    thread: ThreadId,
}

impl SerialQueue {
    pub(super) fn start(label: &str) -> io::Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let name = label.to_owned();
        let handle = thread::Builder::new()
            .name(label.to_owned())
            .spawn(move || {
                for job in receiver {
                    run_job(job, &name);
                }
                trace!(queue = %name, "serial queue drained and closed");
            })?;
        Ok(Self {
            sender,
            thread: handle.thread().id(),
        })
    }

    pub(super) fn push(&self, job: Job, label: &str) {
        if self.sender.send(job).is_err() {
            // The receiver lives as long as the thread, which only stops after
            // every sender is gone; reaching this means the thread was killed.
            error!(queue = label, "serial queue thread is gone, dropping job");
        }
    }

    pub(super) fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }
}
