//! Suspension, resumption and cancellation through continuations

use proptest::prelude::*;
use scheduler::{Continuation, Scheduler, SchedulerConfig, TaskState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use types::{Outcome, RuntimeError};

const WAIT: Duration = Duration::from_secs(30);

fn scheduler(workers: usize) -> Scheduler {
    Scheduler::new(SchedulerConfig::with_workers(workers)).unwrap()
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[test]
fn ten_thousand_waiters_observe_one_result() {
    const TASKS: usize = 10_000;

    let sched = scheduler(4);
    let shared: Continuation<u64> = Continuation::new();
    let observed = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..TASKS)
        .map(|_| {
            let reader = shared.clone();
            let observed = observed.clone();
            sched.spawn(async move {
                let value = reader.await.into_result().unwrap();
                if value == 42 {
                    observed.fetch_add(1, Ordering::SeqCst);
                }
                value
            })
        })
        .collect();

    assert!(wait_until(|| shared.waiters() == TASKS));
    assert_eq!(sched.live_tasks(), TASKS);

    shared.set_value(42).unwrap();
    assert!(sched.wait_quiescent_timeout(WAIT));

    assert_eq!(observed.load(Ordering::SeqCst), TASKS);
    for handle in &handles {
        assert_eq!(handle.state(), TaskState::Terminated);
        assert_eq!(handle.result().try_get(), Some(&Outcome::Completed(42)));
    }
    assert_eq!(sched.stats().completed, TASKS as u64);
}

#[test]
fn cancelled_waiter_is_not_revived() {
    let sched = scheduler(2);
    let gate: Continuation<u32> = Continuation::new();
    let reached_end = Arc::new(AtomicUsize::new(0));

    let reader = gate.clone();
    let flag = reached_end.clone();
    let handle = sched.spawn(async move {
        let value = reader.await;
        flag.fetch_add(1, Ordering::SeqCst);
        value
    });

    assert!(wait_until(|| handle.state() == TaskState::Suspended));
    assert!(handle.cancel());
    assert_eq!(handle.state(), TaskState::Terminated);
    assert_eq!(handle.wait(), Outcome::Cancelled);

    // satisfying the gate afterwards neither fails nor resumes the body
    gate.set_value(7).unwrap();
    assert!(sched.wait_quiescent_timeout(WAIT));
    assert_eq!(reached_end.load(Ordering::SeqCst), 0);
    assert_eq!(handle.state(), TaskState::Terminated);
    assert_eq!(handle.wait(), Outcome::Cancelled);
    assert!(!handle.cancel());

    let stats = sched.stats();
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.resumed, 0);
}

#[test]
fn cancelling_active_task_takes_effect_at_next_suspension() {
    let sched = scheduler(1);
    let started: Continuation<()> = Continuation::new();
    let release: Continuation<()> = Continuation::new();
    let later: Continuation<()> = Continuation::new();

    let (s, r, l) = (started.clone(), release.clone(), later.clone());
    let handle = sched.spawn(async move {
        s.set_value(()).unwrap();
        // spin on the worker until released; the task stays active
        while !r.is_ready() {
            std::hint::spin_loop();
        }
        l.await;
        "finished"
    });

    started.wait();
    assert_eq!(handle.state(), TaskState::Active);
    assert!(handle.cancel());
    assert!(!handle.is_terminated());

    release.set_value(()).unwrap();
    assert_eq!(handle.wait(), Outcome::Cancelled);
    assert!(handle.is_terminated());
}

#[test]
fn no_lost_wakeups_under_racing_writers() {
    const ROUNDS: usize = 500;

    let sched = scheduler(4);
    for round in 0..ROUNDS {
        let c: Continuation<usize> = Continuation::new();
        let reader = c.clone();
        let handle = sched.spawn(async move { reader.await.into_result().unwrap() });

        let writer = c.clone();
        let t = thread::spawn(move || writer.set_value(round).unwrap());

        assert_eq!(handle.result().wait_timeout(WAIT), Some(Outcome::Completed(round)));
        t.join().unwrap();
    }
    assert!(sched.wait_quiescent_timeout(WAIT));
}

#[test]
fn chained_continuations_propagate_failure() {
    let sched = scheduler(2);
    let source: Continuation<u32> = Continuation::new();
    let described = source
        .then(&sched, |o| o.map(|v| v + 1))
        .then(&sched, |o| match o {
            Outcome::Completed(Outcome::Failed(err)) => err.to_string(),
            other => format!("{:?}", other),
        });

    source
        .set_result(Err(RuntimeError::action_failed("probe", "nope")))
        .unwrap();
    let text = described.wait().into_result().unwrap();
    assert!(text.contains("nope"));
}

#[test]
fn shutdown_with_suspended_tasks_delivers_cancelled() {
    let sched = scheduler(2);
    let never: Continuation<u8> = Continuation::new();
    let handles: Vec<_> = (0..100)
        .map(|_| {
            let reader = never.clone();
            sched.spawn(async move { reader.await })
        })
        .collect();

    sched.shutdown();
    for handle in handles {
        assert_eq!(handle.wait(), Outcome::Cancelled);
    }
    assert_eq!(sched.live_tasks(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn exactly_one_assignment_succeeds(values in proptest::collection::vec(any::<i64>(), 1..16)) {
        let c: Continuation<i64> = Continuation::new();
        let writers: Vec<_> = values
            .iter()
            .map(|&v| {
                let c = c.clone();
                thread::spawn(move || c.set_value(v))
            })
            .collect();

        let results: Vec<_> = writers.into_iter().map(|t| t.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        prop_assert_eq!(winners, 1);
        prop_assert!(results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| *r == Err(RuntimeError::AlreadySatisfied)));

        let winner = match c.try_get() {
            Some(Outcome::Completed(v)) => *v,
            other => panic!("unexpected outcome {:?}", other),
        };
        prop_assert!(values.contains(&winner));
    }
}
