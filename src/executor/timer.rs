use crate::{config, executor::run_job, types::Job};
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::Arc,
    thread,
    time::Instant,
};
use tracing::{debug, trace};

/// Process-wide timer moving delayed jobs onto their queues.
///
/// Jobs fire on the timer thread, so they must only hand work off (for
/// example push onto a queue), never do the work themselves.
#[derive(Debug)]
pub(super) struct Timer {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    entries: Mutex<Entries>,
    wakeup: Condvar,
}

#[derive(Debug, Default)]
struct Entries {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

#[derive(derive_more::Debug)]
struct Entry {
    deadline: Instant,
    /// Breaks ties between equal deadlines in insertion order.
    seq: u64,
    #[debug(skip)]
    job: Job,
}

// `BinaryHeap` is a max-heap: the earliest deadline must compare greatest.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

static TIMER: Lazy<Timer> = Lazy::new(|| {
    let name = format!("{}-timer", config::current().thread_name_prefix());
    Timer::start(&name).unwrap_or_else(|err| panic!("failed to start the timer thread: {err}"))
});

pub(super) fn timer() -> &'static Timer {
    &TIMER
}

impl Timer {
    fn start(name: &str) -> std::io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let worker = Arc::clone(&shared);
        let label = name.to_owned();
        thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || worker.run(&label))?;
        debug!(thread = name, "timer started");
        Ok(Self { shared })
    }

    /// Run `job` on the timer thread once `deadline` has passed.
    pub(super) fn schedule(&self, deadline: Instant, job: Job) {
        let mut entries = self.shared.entries.lock();
        let seq = entries.next_seq;
        entries.next_seq += 1;
        let earliest = entries.heap.peek().is_none_or(|head| deadline < head.deadline);
        entries.heap.push(Entry { deadline, seq, job });
        drop(entries);
        if earliest {
            self.shared.wakeup.notify_one();
        }
    }
}

impl Shared {
    fn run(&self, label: &str) {
        let mut entries = self.entries.lock();
        loop {
            let Some(deadline) = entries.heap.peek().map(|head| head.deadline) else {
                self.wakeup.wait(&mut entries);
                continue;
            };
            if deadline > Instant::now() {
                // Woken early either by a new, earlier entry or spuriously;
                // both cases re-read the head.
                if self.wakeup.wait_until(&mut entries, deadline).timed_out() {
                    trace!(queue = %label, "timer deadline reached");
                }
                continue;
            }
            if let Some(entry) = entries.heap.pop() {
                MutexGuard::unlocked(&mut entries, || run_job(entry.job, label));
            }
        }
    }
}
