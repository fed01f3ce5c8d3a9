use crate::{PhysicalAddress, XEN_PAGE_SHIFT};
use core::fmt;
use core::ops::Add;

/// Guest frame number.
///
/// The hypervisor names guest memory in [`XEN_PAGE_SIZE`](crate::XEN_PAGE_SIZE)
/// units. A `Gfn` is the guest-physical address of a frame shifted right by
/// [`XEN_PAGE_SHIFT`]; on auto-translated guests (all ARM guests, PVH on x86)
/// it is the value written into grant entries and physmap requests.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let gfn = Gfn::new(0x38000);
/// assert_eq!(gfn.base(), PhysicalAddress::new(0x3800_0000));
/// assert_eq!(PhysicalAddress::new(0x3800_0FFF).gfn(), gfn);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Gfn(u64);

impl Gfn {
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

    /// The frame number as stored in a v1 grant entry.
    ///
    /// Grant entries only have room for 32 bits; returns `None` for a frame
    /// that cannot be shared through the v1 table.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn try_as_u32(self) -> Option<u32> {
        if self.0 >> 32 == 0 {
            Some(self.0 as u32)
        } else {
            None
        }
    }

    /// First guest-physical address of this frame.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << XEN_PAGE_SHIFT)
    }
}

impl fmt::Debug for Gfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gfn({:#x})", self.0)
    }
}

impl fmt::Display for Gfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gfn:{:#x}", self.0)
    }
}

impl From<PhysicalAddress> for Gfn {
    #[inline]
    fn from(pa: PhysicalAddress) -> Self {
        pa.gfn()
    }
}

impl Add<u64> for Gfn {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}
