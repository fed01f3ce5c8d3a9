use crate::{Gfn, XEN_PAGE_MASK, XEN_PAGE_SHIFT};
use core::fmt;
use core::ops::{Add, AddAssign};

/// Guest-physical memory address.
///
/// Denotes an address in the guest's physical address space (RAM or MMIO as
/// seen by the guest). It exists to keep physical and virtual values apart at
/// the type level; the hypervisor translates it further, which is invisible
/// here.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let pa = PhysicalAddress::new(0x3800_0123);
/// assert_eq!(pa.gfn(), Gfn::new(0x38000));
/// assert_eq!(pa.page_offset(), 0x123);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Frame number of the 4 KiB frame containing this address.
    #[inline]
    #[must_use]
    pub const fn gfn(self) -> Gfn {
        Gfn::new(self.0 >> XEN_PAGE_SHIFT)
    }

    /// Offset of this address inside its 4 KiB frame.
    #[inline]
    #[must_use]
    pub const fn page_offset(self) -> u64 {
        self.0 & XEN_PAGE_MASK
    }

    #[inline]
    #[must_use]
    pub const fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<Gfn> for PhysicalAddress {
    #[inline]
    fn from(gfn: Gfn) -> Self {
        gfn.base()
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
