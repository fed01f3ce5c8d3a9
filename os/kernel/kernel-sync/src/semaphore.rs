use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A bounded counting semaphore.
///
/// The count always stays within `0..=limit`. [`acquire`](Self::acquire)
/// waits while the count is zero; [`release`](Self::release) increments it
/// unless the limit is already reached, in which case the release is dropped
/// (matching a "give" on a full kernel semaphore).
///
/// Waiting is a busy-wait: the semaphore has no scheduler to park on. Use
/// [`acquire_with`](Self::acquire_with) to yield the CPU between polls when
/// a scheduler is available.
///
/// ```rust
/// # use kernel_sync::Semaphore;
/// let sem = Semaphore::new(1, 2);
/// sem.acquire();
/// assert!(!sem.try_acquire());
/// assert!(sem.release());
/// assert!(sem.release());
/// assert!(!sem.release(), "limit reached");
/// assert_eq!(sem.available(), 2);
/// ```
pub struct Semaphore {
    count: AtomicUsize,
    limit: usize,
}

impl Semaphore {
    /// Create a semaphore holding `initial` units out of `limit`.
    ///
    /// `initial` is clamped to `limit`.
    #[must_use]
    pub const fn new(initial: usize, limit: usize) -> Self {
        let initial = if initial > limit { limit } else { initial };
        Self {
            count: AtomicUsize::new(initial),
            limit,
        }
    }

    /// Take one unit if one is available right now.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Take one unit, spinning until one becomes available.
    #[inline]
    pub fn acquire(&self) {
        self.acquire_with(spin_loop);
    }

    /// Take one unit, calling `relax` between polls while none is available.
    pub fn acquire_with(&self, mut relax: impl FnMut()) {
        while !self.try_acquire() {
            while self.count.load(Ordering::Relaxed) == 0 {
                relax();
            }
        }
    }

    /// Return one unit. Returns `false` if the semaphore was already full.
    #[inline]
    pub fn release(&self) -> bool {
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            if current >= self.limit {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current + 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Units currently available. Only a snapshot under concurrency.
    #[inline]
    #[must_use]
    pub fn available(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}
