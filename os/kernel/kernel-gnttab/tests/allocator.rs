use kernel_gnttab::{GrantRef, GrefAllocator};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn exhausted_allocator_blocks_until_release() {
    // 4 slots with 1 reserved leaves 3 references
    let grefs = Arc::new(GrefAllocator::<4>::new(1));
    let held: Vec<GrantRef> = (0..3).map(|_| grefs.acquire()).collect();
    assert_eq!(
        held.iter().map(|g| g.as_u32()).collect::<Vec<_>>(),
        [1, 2, 3]
    );
    assert_eq!(grefs.try_acquire(), None);

    let got = Arc::new(Mutex::new(None));
    let done = Arc::new(AtomicBool::new(false));
    let waiter = {
        let grefs = Arc::clone(&grefs);
        let got = Arc::clone(&got);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let gref = grefs.acquire_with(thread::yield_now);
            *got.lock().unwrap() = Some(gref);
            done.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::SeqCst), "fourth acquire must wait");

    assert!(grefs.release(held[1]));
    waiter.join().unwrap();
    assert_eq!(*got.lock().unwrap(), Some(held[1]));
}

#[test]
fn no_reference_is_handed_out_twice() {
    let grefs = GrefAllocator::<64>::new(8);
    let mut outstanding = Vec::new();
    let mut seen = HashSet::new();

    // deterministic interleaving of acquires and releases
    let mut x: u32 = 0x2545_f491;
    for _ in 0..2_000 {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        if x % 3 != 0 || outstanding.is_empty() {
            if let Some(gref) = grefs.try_acquire() {
                assert!(gref.as_u32() >= 8 && gref.as_u32() < 64);
                assert!(seen.insert(gref), "{gref} handed out twice");
                outstanding.push(gref);
            } else {
                assert_eq!(outstanding.len(), 56);
            }
        } else {
            let gref = outstanding.swap_remove(x as usize % outstanding.len());
            assert!(seen.remove(&gref));
            assert!(grefs.release(gref));
        }
        assert_eq!(grefs.available(), 56 - outstanding.len());
    }
}

#[test]
fn concurrent_acquire_release_stays_consistent() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 500;

    let grefs = Arc::new(GrefAllocator::<32>::new(8));
    let owned = Arc::new(Mutex::new(HashSet::new()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let grefs = Arc::clone(&grefs);
            let owned = Arc::clone(&owned);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    let gref = grefs.acquire_with(thread::yield_now);
                    assert!(owned.lock().unwrap().insert(gref), "{gref} owned twice");
                    thread::yield_now();
                    assert!(owned.lock().unwrap().remove(&gref));
                    assert!(grefs.release(gref));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(grefs.available(), 24);
    let all: HashSet<_> = (0..24).map(|_| grefs.acquire().as_u32()).collect();
    assert_eq!(all, (8..32).collect());
}
