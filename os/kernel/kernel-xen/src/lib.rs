//! # Xen Guest Interface
//!
//! The subset of the Xen public ABI a paravirtualized guest needs to share
//! memory through grant tables, plus the hypercall surface that carries it.
//!
//! ## Layout
//!
//! * [`grant_table`]: `GNTTABOP_*` records ([`MapGrantRef`],
//!   [`UnmapGrantRef`], [`QuerySize`]), grant entry flag bits
//!   ([`GrantFlags`]), map flags ([`MapFlags`]) and the status codes returned
//!   per record ([`GrantStatus`]).
//! * [`memory`]: `XENMEM_*` records used to add, remove and repopulate
//!   frames in the guest's physical address map.
//! * [`hypercall`]: the [`Hypervisor`] trait the rest of the kernel talks
//!   to, and [`HypercallError`].
//! * `arm64` (feature `asm`, `aarch64` only): [`Arm64Hypervisor`], the
//!   `hvc #0xEA1` transport.
//!
//! Every record is `#[repr(C)]` and matches the hypervisor's layout byte for
//! byte; the size assertions next to each record keep it that way.
//!
//! ## Identifiers
//!
//! ```rust
//! # use kernel_xen::*;
//! assert_eq!(DOMID_SELF.as_u16(), 0x7FF0);
//! assert_eq!(GrantRef::new(9).as_usize(), 9);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
mod arm64;
pub mod grant_table;
pub mod hypercall;
pub mod memory;

#[cfg(all(feature = "asm", target_arch = "aarch64"))]
pub use arm64::Arm64Hypervisor;
pub use grant_table::{
    GrantFlags, GrantRef, GrantStatus, MapFlags, MapGrantRef, QuerySize, UnmapGrantRef,
    gnttabop_error,
};
pub use hypercall::{HypercallError, Hypervisor};
pub use memory::{AddToPhysmap, MemoryReservation, RemoveFromPhysmap};

use core::fmt;

/// Domain identifier.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DomId(u16);

impl DomId {
    #[inline]
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for DomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == DOMID_SELF {
            f.write_str("DomId(SELF)")
        } else {
            write!(f, "DomId({})", self.0)
        }
    }
}

impl fmt::Display for DomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

/// The control domain.
pub const DOMID_0: DomId = DomId::new(0);

/// "The calling domain" in memory and grant-table operations.
pub const DOMID_SELF: DomId = DomId::new(0x7FF0);
