#![allow(missing_docs)]
#![cfg(feature = "loom")]

use chainq::{Task, TaskError, WaitResult, WorkItem, WorkState};
use loom::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

#[derive(Clone)]
struct Counters {
    action: Arc<AtomicUsize>,
    notify: Arc<AtomicUsize>,
}

impl Counters {
    fn new() -> Self {
        Self {
            action: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn item(&self) -> WorkItem {
        let action = Arc::clone(&self.action);
        let item = WorkItem::new(move || {
            action.fetch_add(1, Ordering::Relaxed);
        });
        let notify = Arc::clone(&self.notify);
        item.notify(move || {
            notify.fetch_add(1, Ordering::Relaxed);
        });
        item
    }

    fn action_runs(&self) -> usize {
        self.action.load(Ordering::Relaxed)
    }

    fn notify_runs(&self) -> usize {
        self.notify.load(Ordering::Relaxed)
    }
}

#[test]
fn loom_cancel_races_perform_with_single_winner() {
    loom::model(|| {
        let counters = Counters::new();
        let item = counters.item();

        let performer = {
            let item = item.clone();
            thread::spawn(move || item.perform())
        };
        let cancelled = item.cancel();
        performer.join().unwrap();

        // Exactly one side wins, and the notify list fires iff the action ran.
        match item.state() {
            WorkState::Cancelled => {
                assert!(cancelled);
                assert_eq!(counters.action_runs(), 0);
                assert_eq!(counters.notify_runs(), 0);
                assert_eq!(item.wait(None), WaitResult::Cancelled);
            }
            WorkState::Completed => {
                assert!(!cancelled);
                assert_eq!(counters.action_runs(), 1);
                assert_eq!(counters.notify_runs(), 1);
                assert_eq!(item.wait(None), WaitResult::Completed);
            }
            state => panic!("unexpected final state {state}"),
        }
    });
}

#[test]
fn loom_concurrent_performs_run_action_once() {
    loom::model(|| {
        let counters = Counters::new();
        let item = counters.item();

        let other = {
            let item = item.clone();
            thread::spawn(move || item.perform())
        };
        item.perform();
        other.join().unwrap();

        assert_eq!(counters.action_runs(), 1);
        assert_eq!(counters.notify_runs(), 1);
        assert_eq!(item.state(), WorkState::Completed);
    });
}

#[test]
fn loom_notify_registered_during_perform_fires_once() {
    loom::model(|| {
        let early = Arc::new(AtomicUsize::new(0));
        let item = WorkItem::new(|| {});
        {
            let early = Arc::clone(&early);
            item.notify(move || {
                early.fetch_add(1, Ordering::Relaxed);
            });
        }

        let performer = {
            let item = item.clone();
            thread::spawn(move || item.perform())
        };
        let late = Arc::new(AtomicUsize::new(0));
        {
            let late = Arc::clone(&late);
            item.notify(move || {
                late.fetch_add(1, Ordering::Relaxed);
            });
        }
        performer.join().unwrap();

        assert_eq!(early.load(Ordering::Relaxed), 1);
        assert_eq!(late.load(Ordering::Relaxed), 1);
    });
}

#[test]
fn loom_output_is_visible_once_completed() {
    loom::model(|| {
        let task = Task::deferred(|| vec![1_u32, 2, 3]);

        let performer = {
            let task = task.clone();
            thread::spawn(move || task.work_item().perform())
        };
        // A concurrent reader either sees nothing yet or the full output.
        match task.result() {
            Ok(output) => assert_eq!(output, &[1, 2, 3]),
            Err(err) => assert_eq!(err, TaskError::Pending),
        }
        performer.join().unwrap();

        assert_eq!(task.wait(None), WaitResult::Completed);
        assert_eq!(task.output(), Some(&vec![1, 2, 3]));
    });
}

#[test]
fn loom_cancelled_task_never_publishes() {
    loom::model(|| {
        let task = Task::deferred(|| 7_u8);

        let performer = {
            let task = task.clone();
            thread::spawn(move || task.work_item().perform())
        };
        let cancelled = task.cancel();
        performer.join().unwrap();

        if cancelled {
            assert_eq!(task.result(), Err(TaskError::Cancelled));
            assert_eq!(task.wait(None), WaitResult::Cancelled);
        } else {
            assert_eq!(task.result(), Ok(&7));
        }
    });
}
