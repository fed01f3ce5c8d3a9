//! # Guest Memory Address Types
//!
//! Strongly typed wrappers for the address kinds a paravirtualized guest deals
//! with when it talks to the hypervisor.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | An address in the guest's (page-table translated) address space. |
//! | [`PhysicalAddress`] | A guest-physical address, i.e. what the guest believes is RAM or MMIO. |
//! | [`Gfn`] | A guest frame number: a guest-physical address shifted right by [`XEN_PAGE_SHIFT`]. |
//!
//! The hypervisor ABI always describes memory in units of 4 KiB frames,
//! independent of the page size the guest kernel itself uses. All conversions
//! between addresses and frame numbers therefore go through the
//! [`XEN_PAGE_SIZE`] granularity.
//!
//! ```text
//!  PhysicalAddress  0x0000_0000_4012_3456
//!                   └────────┬───────┘└┬┘
//!                      Gfn 0x40123    offset 0x456
//! ```
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let pa = PhysicalAddress::new(0x4012_3456);
//! let gfn = pa.gfn();
//! assert_eq!(gfn.as_u64(), 0x40123);
//! assert_eq!(gfn.base(), PhysicalAddress::new(0x4012_3000));
//! assert_eq!(pa.page_offset(), 0x456);
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` over `u64` and implement `Copy`,
//!   `Eq`, `Ord` and `Hash`.
//! - Frame numbers handed to the grant table are 32 bit wide (`grant_entry_v1`
//!   stores a `u32` frame); [`Gfn::try_as_u32`] refuses
//!   wider frames instead of truncating them.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod gfn;
mod physical_address;
mod virtual_address;

pub use gfn::Gfn;
pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// log2 of the hypervisor page size.
pub const XEN_PAGE_SHIFT: u32 = 12;

/// Hypervisor page size in bytes (4 KiB on every Xen architecture).
pub const XEN_PAGE_SIZE: u64 = 1 << XEN_PAGE_SHIFT;

/// Mask selecting the in-page offset bits.
pub const XEN_PAGE_MASK: u64 = XEN_PAGE_SIZE - 1;

/// Align `value` down to a [`XEN_PAGE_SIZE`] boundary.
#[inline]
#[must_use]
pub const fn align_down(value: u64) -> u64 {
    value & !XEN_PAGE_MASK
}

/// Align `value` up to a [`XEN_PAGE_SIZE`] boundary.
#[inline]
#[must_use]
pub const fn align_up(value: u64) -> u64 {
    (value + XEN_PAGE_MASK) & !XEN_PAGE_MASK
}
