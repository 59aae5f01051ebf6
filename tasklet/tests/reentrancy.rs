mod common;

use std::sync::{Arc, Mutex};

use tasklet::{ExecError, Executor};

#[test]
fn test_task_posted_from_task_waits_for_next_run() {
    common::init_tracing();

    let executor = Arc::new(Executor::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let ex = executor.clone();
    let sink = log.clone();
    executor.post(move || {
        sink.lock().unwrap().push("t1");

        let sink = sink.clone();
        ex.post(move || sink.lock().unwrap().push("t4"));
    });

    assert_eq!(executor.run(), Ok(1));
    assert_eq!(*log.lock().unwrap(), vec!["t1"]);
    assert_eq!(executor.pending(), 1);

    assert_eq!(executor.run(), Ok(1));
    assert_eq!(*log.lock().unwrap(), vec!["t1", "t4"]);

    assert_eq!(executor.run(), Ok(0));
}

#[test]
fn test_self_reposting_task_runs_once_per_run() {
    fn tick(executor: Arc<Executor>, count: Arc<Mutex<usize>>) {
        let mut n = count.lock().unwrap();
        *n += 1;

        if *n < 5 {
            drop(n);
            let ex = executor.clone();
            executor.post(move || tick(ex, count));
        }
    }

    let executor = Arc::new(Executor::new());
    let count = Arc::new(Mutex::new(0));

    let ex = executor.clone();
    let c = count.clone();
    executor.post(move || tick(ex, c));

    for expected in 1..=5 {
        assert_eq!(executor.run(), Ok(1));
        assert_eq!(*count.lock().unwrap(), expected);
    }

    assert!(executor.is_empty());
    assert_eq!(executor.run(), Ok(0));
}

#[test]
fn test_run_from_inside_task_is_rejected() {
    let executor = Arc::new(Executor::new());
    let nested = Arc::new(Mutex::new(None));
    let log = Arc::new(Mutex::new(Vec::new()));

    let ex = executor.clone();
    let seen = nested.clone();
    executor.post(move || {
        assert!(ex.is_running());
        *seen.lock().unwrap() = Some(ex.run());
    });

    let sink = log.clone();
    executor.post(move || sink.lock().unwrap().push("after"));

    assert_eq!(executor.run(), Ok(2));
    assert_eq!(*nested.lock().unwrap(), Some(Err(ExecError::AlreadyRunning)));
    assert_eq!(*log.lock().unwrap(), vec!["after"]);
    assert!(!executor.is_running());
}
