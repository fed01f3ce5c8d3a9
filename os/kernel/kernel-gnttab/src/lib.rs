//! # Grant Table Manager
//!
//! A paravirtualized guest shares individual pages with other domains by
//! writing permission records into a table the hypervisor can read: the
//! *grant table*. Each record names one frame, the domain allowed to access
//! it, and whether that access is read-only. The remote domain refers to the
//! record by its index, the *grant reference*.
//!
//! This crate owns that table for the guest side:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ GrantTable                                               │
//! │                                                          │
//! │  GrefAllocator ──► grant_access / end_access             │
//! │  (free list +       (GrantEntryV1 state machine)         │
//! │   semaphore)                 │                           │
//! │                              ▼                           │
//! │  alloc_and_grant / get_page / put_page   map_refs /      │
//! │  (page lifecycle, physmap)               unmap_refs      │
//! │                                          (batched ops)   │
//! └───────────────┬──────────────────────────────┬───────────┘
//!                 │ PageAllocator, GfnTranslator  │ Hypervisor
//!                 ▼ Delay, DeviceMapper           ▼
//!           guest kernel services          privileged calls
//! ```
//!
//! ## Entry lifecycle
//!
//! ```text
//! Free ──acquire──► claimed ──permit_access──► Granted ──remote maps──► in use
//!  ▲                                              │                       │
//!  └──────────── release ◄── flags = 0 ◄── end_access ◄── remote unmaps ──┘
//! ```
//!
//! `end_access` refuses to clear an entry while the hypervisor reports the
//! remote side as reading or writing it; the reference then stays allocated
//! and the caller retries later.
//!
//! ## Start of day
//!
//! [`GrantTable::init`] (or the [`gnttab_init`] hook) runs once: it checks
//! the hypervisor supports [`NR_GRANT_FRAMES`] frames, asks it to place the
//! table frames at the reserved region, maps that region and seeds the free
//! list. Everything else requires a constructed table.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod allocator;
mod batch;
mod entry;
mod error;
mod init;
mod page;
mod platform;
mod table;

pub use allocator::{GREF_IN_USE, GrefAllocator};
pub use batch::{GOP_RETRY_DELAY_MS, GOP_RETRY_STEP_MS};
pub use entry::GrantEntryV1;
pub use error::GrantError;
pub use init::{GrantTableConfig, LEGACY_MAX_GRANT_FRAMES, gnttab_init};
pub use page::{ForeignPage, GrantedPage};
pub use platform::{Delay, DeviceMapper, GfnTranslator, PageAllocator};
pub use table::GrantTable;

pub use kernel_xen::{DomId, GrantFlags, GrantRef, GrantStatus, MapGrantRef, UnmapGrantRef};

use kernel_memory_addresses::XEN_PAGE_SIZE;

/// Number of 4 KiB frames making up the grant table.
pub const NR_GRANT_FRAMES: usize = 1;

/// Grant references below this value are reserved for well-known grants
/// (console and xenstore rings) and never handed out.
pub const GNTTAB_NR_RESERVED_ENTRIES: u32 = 8;

/// Bytes of address space the table occupies.
pub const GNTTAB_SIZE: u64 = NR_GRANT_FRAMES as u64 * XEN_PAGE_SIZE;

/// Number of v1 entries the table holds.
#[allow(clippy::cast_possible_truncation)]
pub const NR_GRANT_ENTRIES: usize = GNTTAB_SIZE as usize / size_of::<GrantEntryV1>();

const _: () = assert!(NR_GRANT_ENTRIES > GNTTAB_NR_RESERVED_ENTRIES as usize);
