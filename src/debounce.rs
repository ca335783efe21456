use crate::executor::Queue;
use core::time::Duration;
use parking_lot::Mutex;
use std::{sync::Arc, time::Instant};
use tracing::trace;

/// Rate limiter created by [`Queue::debounce`].
///
/// Every [`Debouncer::call`] schedules the action for one delay after its
/// last run. A scheduled run fires only if no other run happened in the
/// meantime, so a steady stream of calls runs the action at most once per
/// delay. Clones share state.
#[derive(Clone)]
pub struct Debouncer {
    queue: Queue,
    delay: Duration,
    shared: Arc<Shared>,
}

struct Shared {
    last_fire: Mutex<Instant>,
    action: Box<dyn Fn() + Send + Sync>,
}

impl core::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Debouncer")
            .field("queue", &self.queue)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl Queue {
    /// Wrap `action` so that calls run it on this queue at most once per
    /// `delay`. The first window starts now.
    pub fn debounce(&self, delay: Duration, action: impl Fn() + Send + Sync + 'static) -> Debouncer {
        Debouncer {
            queue: self.clone(),
            delay,
            shared: Arc::new(Shared {
                last_fire: Mutex::new(Instant::now()),
                action: Box::new(action),
            }),
        }
    }
}

impl Debouncer {
    /// Request a run at the end of the current window.
    pub fn call(&self) {
        let Some(deadline) = self.shared.deadline(self.delay) else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        let delay = self.delay;
        self.queue
            .spawn_after(Some(deadline.saturating_duration_since(Instant::now())), move || {
                shared.fire(delay);
            });
    }
}

impl Shared {
    fn deadline(&self, delay: Duration) -> Option<Instant> {
        self.last_fire.lock().checked_add(delay)
    }

    fn fire(&self, delay: Duration) {
        {
            let mut last_fire = self.last_fire.lock();
            let now = Instant::now();
            if last_fire.checked_add(delay).is_none_or(|deadline| now < deadline) {
                trace!("debounced call superseded by an earlier run");
                return;
            }
            *last_fire = now;
        }
        (self.action)();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    #[test]
    fn burst_collapses_into_one_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let queue = Queue::serial("debounce-burst").unwrap();
        let debounced = queue.debounce(Duration::from_millis(80), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        for _ in 0..5 {
            debounced.call();
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(400));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn separated_calls_each_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let queue = Queue::serial("debounce-separate").unwrap();
        let debounced = queue.debounce(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debounced.call();
        thread::sleep(Duration::from_millis(200));
        debounced.call();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn steady_calls_still_run_once_per_window() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let queue = Queue::serial("debounce-steady").unwrap();
        let debounced = queue.debounce(Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(400) {
            debounced.call();
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(200));
        let runs = runs.load(Ordering::SeqCst);
        assert!(runs > 1, "expected several runs, got {runs}");
        // At most one run per window over roughly 600ms of activity.
        assert!(runs <= 13, "expected throttled runs, got {runs}");
    }
}
