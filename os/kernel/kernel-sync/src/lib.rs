//! # Kernel synchronization primitives
//!
//! Three small building blocks, all usable from `no_std`:
//!
//! * [`SpinLock`]: test-and-test-and-set lock for short, bounded critical
//!   sections that must never block inside.
//! * [`Semaphore`]: a bounded counting semaphore. [`Semaphore::acquire`] is
//!   the only operation in this crate that may wait for another context.
//! * [`SyncOnceCell`]: one-shot initialization of a shared value.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod semaphore;
mod spin_lock;
mod sync_once_cell;

pub use semaphore::Semaphore;
pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::SyncOnceCell;
