#![allow(missing_docs)]
#![cfg(not(feature = "loom"))]

use chainq::{Cohort, ExecutionClass, WaitResult, for_each};
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

#[test]
fn cohort_waits_for_every_member() {
    let cohort = Cohort::new();
    let finished = Arc::new(AtomicUsize::new(0));
    let nap = Duration::from_millis(50);
    let start = Instant::now();
    for _ in 0..3 {
        let finished = Arc::clone(&finished);
        cohort.submit(&ExecutionClass::Background, move || {
            thread::sleep(nap);
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(cohort.wait(None), WaitResult::Completed);
    assert!(start.elapsed() >= nap);
    assert_eq!(finished.load(Ordering::SeqCst), 3);
    assert_eq!(cohort.pending(), 0);
}

#[test]
fn cohort_spans_classes() {
    let cohort = Cohort::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let classes = [
        ExecutionClass::Interactive,
        ExecutionClass::Initiated,
        ExecutionClass::Utility,
        ExecutionClass::Background,
        ExecutionClass::Main,
    ];
    for class in &classes {
        let seen = Arc::clone(&seen);
        let name = class.to_string();
        cohort.submit(class, move || seen.lock().unwrap().push(name));
    }
    assert_eq!(cohort.wait(Some(Duration::from_secs(10))), WaitResult::Completed);
    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, ["background", "initiated", "interactive", "main", "utility"]);
}

#[test]
fn cohort_tracks_external_work_with_enter_and_leave() {
    let cohort = Cohort::new();
    cohort.enter();
    let member = cohort.clone();
    let worker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        member.leave();
    });
    assert_eq!(cohort.wait(Some(Duration::ZERO)), WaitResult::TimedOut);
    assert_eq!(cohort.wait(Some(Duration::from_secs(10))), WaitResult::Completed);
    worker.join().unwrap();
}

#[test]
fn timed_out_wait_does_not_stop_members() {
    let cohort = Cohort::new();
    let done = Arc::new(AtomicUsize::new(0));
    let flag = Arc::clone(&done);
    cohort.submit(&ExecutionClass::Utility, move || {
        thread::sleep(Duration::from_millis(80));
        flag.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(cohort.wait(Some(Duration::from_millis(5))), WaitResult::TimedOut);
    assert_eq!(cohort.wait(None), WaitResult::Completed);
    assert_eq!(done.load(Ordering::SeqCst), 1);
}

#[test]
fn cohort_is_reusable_for_sequential_waves() {
    let cohort = Cohort::new();
    let total = Arc::new(AtomicUsize::new(0));
    for wave in 1..=3 {
        for _ in 0..4 {
            let total = Arc::clone(&total);
            cohort.submit(&ExecutionClass::Background, move || {
                total.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(cohort.wait(Some(Duration::from_secs(10))), WaitResult::Completed);
        assert_eq!(total.load(Ordering::SeqCst), wave * 4);
    }
}

#[test]
fn overlapping_waves_are_not_distinguished() {
    // A waiter from the first wave also waits out a second wave started before
    // the first drained; callers have to sequence waves themselves.
    let cohort = Cohort::new();
    let first = cohort.guard();
    let second = cohort.guard();
    drop(first);
    assert_eq!(cohort.wait(Some(Duration::from_millis(10))), WaitResult::TimedOut);
    drop(second);
    assert_eq!(cohort.wait(Some(Duration::ZERO)), WaitResult::Completed);
}

#[test]
fn for_each_records_every_index_exactly_once() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let cohort = Cohort::new();
    let count = 100;
    for _ in 0..count {
        cohort.enter();
    }
    let recorder = Arc::clone(&seen);
    let member = cohort.clone();
    for_each(count, &ExecutionClass::Background, move |i| {
        recorder.lock().unwrap().push(i);
        member.leave();
    });
    assert_eq!(cohort.wait(Some(Duration::from_secs(10))), WaitResult::Completed);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), count);
    let distinct: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(distinct, (0..count).collect());
}

#[test]
fn for_each_returns_before_the_body_runs() {
    let cohort = Cohort::new();
    cohort.enter();
    let member = cohort.clone();
    let start = Instant::now();
    for_each(1, &ExecutionClass::Utility, move |_| {
        thread::sleep(Duration::from_millis(100));
        member.leave();
    });
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(cohort.wait(Some(Duration::from_secs(10))), WaitResult::Completed);
}

#[test]
fn for_each_on_main_runs_in_index_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let cohort = Cohort::new();
    let guard = Arc::new(Mutex::new(Some(cohort.guard())));
    let recorder = Arc::clone(&seen);
    for_each(20, &ExecutionClass::Main, move |i| {
        assert!(ExecutionClass::Main.is_current());
        recorder.lock().unwrap().push(i);
        if i == 19 {
            guard.lock().unwrap().take();
        }
    });
    assert_eq!(cohort.wait(Some(Duration::from_secs(10))), WaitResult::Completed);
    assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
}
