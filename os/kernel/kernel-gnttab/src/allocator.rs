//! Grant reference allocation.
//!
//! Free references form an intrusive singly linked list stored in an array
//! of `N` words indexed by reference:
//!
//! ```text
//!  index:   0      1     ..  R-1    R     R+1   ..  N-1
//!  value: [head] [ - ]  .. [ - ]  [R+1] [R+2] .. [ 0 ]
//!           │                       ▲
//!           └───────────────────────┘
//! ```
//!
//! Slot 0 holds the head, slot `i` holds the successor of free reference `i`
//! and `0` terminates the list. Allocated references are marked with
//! [`GREF_IN_USE`] so a double release can be detected. Both operations are
//! O(1) under a short spin lock; a counting semaphore tracks how many
//! references are free so that allocation waits instead of failing.

use core::hint::spin_loop;
use kernel_sync::{Semaphore, SpinLock};
use kernel_xen::GrantRef;
use log::warn;

/// Marks a list slot whose reference is currently allocated.
pub const GREF_IN_USE: u32 = u32::MAX - 1;

/// O(1) allocator for the references `reserved..N`.
pub struct GrefAllocator<const N: usize> {
    list: SpinLock<[u32; N]>,
    free: Semaphore,
    reserved: u32,
}

impl<const N: usize> GrefAllocator<N> {
    /// Build the allocator with every reference from `reserved` up free.
    ///
    /// # Panics
    /// `reserved` must be at least 1 (slot 0 holds the list head) and leave
    /// at least one allocatable reference.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(reserved: u32) -> Self {
        assert!(reserved >= 1, "slot 0 is the list head");
        assert!((reserved as usize) < N, "no allocatable references");
        assert!(N <= GREF_IN_USE as usize);

        let mut list = [0u32; N];
        list[0] = reserved;
        let mut i = reserved as usize;
        while i < N - 1 {
            list[i] = (i + 1) as u32;
            i += 1;
        }
        list[N - 1] = 0;

        let capacity = N - reserved as usize;
        Self {
            list: SpinLock::new(list),
            free: Semaphore::new(capacity, capacity),
            reserved,
        }
    }

    /// Take a free reference, waiting until one is released if necessary.
    pub fn acquire(&self) -> GrantRef {
        self.acquire_with(spin_loop)
    }

    /// Like [`acquire`](Self::acquire), calling `relax` between polls.
    pub fn acquire_with(&self, relax: impl FnMut()) -> GrantRef {
        self.free.acquire_with(relax);
        self.pop()
    }

    /// Take a free reference if one is available right now.
    pub fn try_acquire(&self) -> Option<GrantRef> {
        self.free.try_acquire().then(|| self.pop())
    }

    /// Return `gref` to the free list.
    ///
    /// Releasing a reference that is not allocated is logged and ignored;
    /// returns whether the reference was actually freed.
    pub fn release(&self, gref: GrantRef) -> bool {
        let idx = gref.as_usize();
        let freed = self.list.with_lock(|list| {
            if list.get(idx).copied() != Some(GREF_IN_USE) {
                return false;
            }
            list[idx] = list[0];
            list[0] = gref.as_u32();
            true
        });

        if freed {
            self.free.release();
        } else {
            warn!("Trying to put already free {gref}");
        }
        freed
    }

    /// Whether `gref` is currently allocated.
    pub fn is_in_use(&self, gref: GrantRef) -> bool {
        self.list
            .with_lock(|list| list.get(gref.as_usize()).copied() == Some(GREF_IN_USE))
    }

    /// Number of references that can be acquired without waiting.
    pub fn available(&self) -> usize {
        self.free.available()
    }

    /// Total number of allocatable references.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.free.limit()
    }

    /// First reference the allocator hands out.
    #[must_use]
    pub const fn reserved(&self) -> u32 {
        self.reserved
    }

    fn pop(&self) -> GrantRef {
        self.list.with_lock(|list| {
            let head = list[0];
            assert!(
                head >= self.reserved && (head as usize) < N,
                "grant reference free list corrupted (head = {head})"
            );
            list[0] = list[head as usize];
            list[head as usize] = GREF_IN_USE;
            GrantRef::new(head)
        })
    }
}
