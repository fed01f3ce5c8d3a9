//! `XENMEM_*` records (`xen/include/public/memory.h`).

use crate::DomId;
use kernel_memory_addresses::Gfn;

/// `XENMEM_populate_physmap`
pub const XENMEM_POPULATE_PHYSMAP: u32 = 6;
/// `XENMEM_add_to_physmap`
pub const XENMEM_ADD_TO_PHYSMAP: u32 = 7;
/// `XENMEM_remove_from_physmap`
pub const XENMEM_REMOVE_FROM_PHYSMAP: u32 = 15;

/// `XENMAPSPACE_shared_info`
pub const XENMAPSPACE_SHARED_INFO: u32 = 0;
/// `XENMAPSPACE_grant_table`
pub const XENMAPSPACE_GRANT_TABLE: u32 = 1;

/// `struct xen_add_to_physmap`: place a hypervisor-owned frame at a gfn.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct AddToPhysmap {
    pub domid: DomId,
    /// Number of pages for `XENMAPSPACE_gmfn_range`; unused otherwise.
    pub size: u16,
    /// One of the `XENMAPSPACE_*` constants.
    pub space: u32,
    /// Index into the source map space (e.g. grant-table frame number).
    pub idx: u64,
    /// Where to place the frame in the guest's physical address map.
    pub gpfn: u64,
}

const _: () = assert!(size_of::<AddToPhysmap>() == 24);

impl AddToPhysmap {
    /// Request for grant-table frame `idx` to appear at `gpfn`.
    #[must_use]
    pub const fn grant_table_frame(domid: DomId, idx: u64, gpfn: Gfn) -> Self {
        Self {
            domid,
            size: 0,
            space: XENMAPSPACE_GRANT_TABLE,
            idx,
            gpfn: gpfn.as_u64(),
        }
    }
}

/// `struct xen_remove_from_physmap`
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RemoveFromPhysmap {
    pub domid: DomId,
    pub gpfn: u64,
}

const _: () = assert!(size_of::<RemoveFromPhysmap>() == 16);

impl RemoveFromPhysmap {
    #[must_use]
    pub const fn new(domid: DomId, gfn: Gfn) -> Self {
        Self {
            domid,
            gpfn: gfn.as_u64(),
        }
    }
}

/// `struct xen_memory_reservation`
///
/// `extent_start` is a guest handle: the guest-virtual address of an array of
/// `nr_extents` frame numbers. The hypervisor reads the gfns to populate from
/// it (and, for `populate_physmap` on auto-translated guests, nothing is
/// written back).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MemoryReservation {
    pub extent_start: u64,
    pub nr_extents: u64,
    pub extent_order: u32,
    pub mem_flags: u32,
    pub domid: DomId,
}

const _: () = assert!(size_of::<MemoryReservation>() == 32);

impl MemoryReservation {
    /// Reservation of order-0 extents listed in `gfns`.
    ///
    /// The record borrows `gfns` only by address; keep the slice alive until
    /// the hypercall returns.
    #[must_use]
    pub fn order0(domid: DomId, gfns: &[u64]) -> Self {
        Self {
            extent_start: gfns.as_ptr() as usize as u64,
            nr_extents: gfns.len() as u64,
            extent_order: 0,
            mem_flags: 0,
            domid,
        }
    }

    /// Reads back the extent list this reservation points at.
    ///
    /// # Safety
    /// `extent_start` must still point at `nr_extents` readable `u64` values,
    /// i.e. the slice passed to [`order0`](Self::order0) must be alive.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn extents(&self) -> &[u64] {
        unsafe {
            core::slice::from_raw_parts(
                self.extent_start as usize as *const u64,
                self.nr_extents as usize,
            )
        }
    }
}
