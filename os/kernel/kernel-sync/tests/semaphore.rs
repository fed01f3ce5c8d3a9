use kernel_sync::{Semaphore, SyncOnceCell};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn initial_is_clamped_to_limit() {
    let s = Semaphore::new(10, 3);
    assert_eq!(s.available(), 3);
    assert_eq!(s.limit(), 3);
}

#[test]
fn try_acquire_drains_to_zero() {
    let s = Semaphore::new(2, 2);
    assert!(s.try_acquire());
    assert!(s.try_acquire());
    assert!(!s.try_acquire());
    assert_eq!(s.available(), 0);
}

#[test]
fn release_saturates_at_limit() {
    let s = Semaphore::new(0, 1);
    assert!(s.release());
    assert!(!s.release());
    assert_eq!(s.available(), 1);
}

#[test]
fn acquire_waits_for_release() {
    let s = Arc::new(Semaphore::new(0, 1));
    let done = Arc::new(AtomicBool::new(false));

    let waiter = {
        let s = Arc::clone(&s);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            s.acquire_with(thread::yield_now);
            done.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(20));
    assert!(!done.load(Ordering::SeqCst), "acquired from an empty semaphore");

    assert!(s.release());
    waiter.join().unwrap();
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(s.available(), 0);
}

#[test]
fn concurrent_holders_never_exceed_limit() {
    let limit = 3;
    let threads = 8;
    let s = Arc::new(Semaphore::new(limit, limit));
    let holders = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let s = Arc::clone(&s);
            let holders = Arc::clone(&holders);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..500 {
                    s.acquire_with(thread::yield_now);
                    let now = holders.fetch_add(1, Ordering::SeqCst) + 1;
                    assert!(now <= limit, "{now} holders for {limit} units");
                    holders.fetch_sub(1, Ordering::SeqCst);
                    assert!(s.release());
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(s.available(), limit);
}

#[test]
fn once_cell_set_only_once() {
    let cell = SyncOnceCell::new();
    assert!(cell.get().is_none());
    assert_eq!(cell.set(5u32).copied(), Ok(5));
    assert_eq!(cell.set(6u32), Err(6));
    assert_eq!(cell.get_or_init(|| 7), &5);
    assert!(cell.is_initialized());
}

#[test]
fn once_cell_racing_initializers_agree() {
    let cell = Arc::new(SyncOnceCell::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cell = Arc::clone(&cell);
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                *cell.get_or_init(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    i
                })
            })
        })
        .collect();

    let values: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn once_cell_try_init_skips_init_while_claimed() {
    let cell = Arc::new(SyncOnceCell::new());
    let started = Arc::new(Barrier::new(2));
    let finish = Arc::new(Barrier::new(2));

    let writer = {
        let cell = Arc::clone(&cell);
        let (started, finish) = (Arc::clone(&started), Arc::clone(&finish));
        thread::spawn(move || {
            cell.try_init(|| {
                started.wait();
                finish.wait();
                1u32
            })
            .copied()
        })
    };

    started.wait();
    let mut ran = false;
    let second = cell.try_init(|| {
        ran = true;
        2
    });
    assert!(second.is_none());
    assert!(!ran, "init must not run on a claimed cell");
    assert!(!cell.is_initialized());

    finish.wait();
    assert_eq!(writer.join().unwrap(), Some(1));
    assert_eq!(cell.get(), Some(&1));
    assert!(cell.try_init(|| 3).is_none());
}
