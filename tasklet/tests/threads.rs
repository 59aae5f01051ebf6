mod common;

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use tasklet::{ExecError, Executor};

#[test]
fn test_two_producers_one_run() {
    let executor = Arc::new(Executor::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["a", "b"]
        .into_iter()
        .map(|name| {
            let executor = executor.clone();
            let log = log.clone();
            let barrier = barrier.clone();

            thread::spawn(move || {
                barrier.wait();
                executor.post(move || log.lock().unwrap().push(name));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(executor.run(), Ok(2));

    let mut seen = log.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["a", "b"]);
}

#[test]
fn test_many_producers_keep_their_own_order() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 1000;

    let executor = Arc::new(Executor::new());
    let log = Arc::new(Mutex::new(Vec::with_capacity(THREADS * PER_THREAD)));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let executor = executor.clone();
            let log = log.clone();

            thread::spawn(move || {
                for seq in 0..PER_THREAD {
                    let log = log.clone();
                    executor.post(move || log.lock().unwrap().push((t, seq)));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(executor.pending(), THREADS * PER_THREAD);
    assert_eq!(executor.run(), Ok(THREADS * PER_THREAD));

    let log = log.lock().unwrap();
    let mut next = [0usize; THREADS];
    for &(t, seq) in log.iter() {
        assert_eq!(seq, next[t], "thread {t} tasks ran out of order");
        next[t] += 1;
    }
    assert!(next.iter().all(|&n| n == PER_THREAD));
}

#[test]
fn test_drain_while_producers_post() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 500;
    const TOTAL: usize = THREADS * PER_THREAD;

    let executor = Arc::new(Executor::new());
    let log = Arc::new(Mutex::new(Vec::with_capacity(TOTAL)));

    let producers: Vec<_> = (0..THREADS)
        .map(|t| {
            let executor = executor.clone();
            let log = log.clone();

            thread::spawn(move || {
                for seq in 0..PER_THREAD {
                    let log = log.clone();
                    executor.post(move || log.lock().unwrap().push((t, seq)));
                }
            })
        })
        .collect();

    let mut invoked = 0;
    while invoked < TOTAL {
        invoked += executor.run().unwrap();
        thread::yield_now();
    }

    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(invoked, TOTAL);
    assert_eq!(executor.run(), Ok(0));

    let log = log.lock().unwrap();
    let unique: HashSet<_> = log.iter().copied().collect();
    assert_eq!(unique.len(), TOTAL, "a task ran more than once");

    let mut next = [0usize; THREADS];
    for &(t, seq) in log.iter() {
        assert_eq!(seq, next[t]);
        next[t] += 1;
    }

    assert_eq!(executor.arena_stats().live_allocations, 0);
}

#[test]
fn test_slow_task_does_not_block_producers() {
    let executor = Arc::new(Executor::new());
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    executor.post(move || {
        entered_tx.send(()).unwrap();
        release_rx.recv().unwrap();
    });

    let consumer = {
        let executor = executor.clone();
        thread::spawn(move || executor.run())
    };

    entered_rx.recv().unwrap();
    assert!(executor.is_running());

    // The drain is parked inside a task: the queue must still accept posts,
    // and a second drain must be refused.
    executor.post(|| {});
    assert_eq!(executor.pending(), 1);
    assert_eq!(executor.run(), Err(ExecError::AlreadyRunning));

    release_tx.send(()).unwrap();
    assert_eq!(consumer.join().unwrap(), Ok(1));

    assert!(!executor.is_running());
    assert_eq!(executor.run(), Ok(1));
}

#[test]
fn test_run_from_another_thread() {
    let executor = Arc::new(Executor::new());
    let ran_on = Arc::new(Mutex::new(None));

    let sink = ran_on.clone();
    executor.post(move || *sink.lock().unwrap() = Some(thread::current().id()));

    let consumer = {
        let executor = executor.clone();
        thread::spawn(move || {
            let invoked = executor.run();
            (invoked, thread::current().id())
        })
    };

    let (invoked, consumer_id) = consumer.join().unwrap();
    assert_eq!(invoked, Ok(1));
    assert_eq!(*ran_on.lock().unwrap(), Some(consumer_id));
}
