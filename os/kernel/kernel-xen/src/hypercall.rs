//! Hypercall surface used by the guest kernel.
//!
//! [`Hypervisor`] is the seam between the kernel and the privileged-call
//! transport. The kernel never builds raw hypercall arguments itself; it fills
//! the fixed-layout records from [`grant_table`](crate::grant_table) and
//! [`memory`](crate::memory) and hands them to an implementation of this
//! trait. [`Arm64Hypervisor`](crate::Arm64Hypervisor) is the real transport;
//! tests substitute their own.

use crate::grant_table::{MapGrantRef, QuerySize, UnmapGrantRef};
use crate::memory::{AddToPhysmap, MemoryReservation, RemoveFromPhysmap};

/// `__HYPERVISOR_memory_op`
pub const HYPERVISOR_MEMORY_OP: u64 = 12;
/// `__HYPERVISOR_console_io`
pub const HYPERVISOR_CONSOLE_IO: u64 = 18;
/// `__HYPERVISOR_grant_table_op`
pub const HYPERVISOR_GRANT_TABLE_OP: u64 = 20;

/// `CONSOLEIO_write`
pub const CONSOLEIO_WRITE: u64 = 0;

/// A hypercall returned a negative errno.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("hypercall failed with {0}")]
pub struct HypercallError(pub i64);

impl HypercallError {
    pub const EPERM: Self = Self(-1);
    pub const ENOENT: Self = Self(-2);
    pub const ESRCH: Self = Self(-3);
    pub const EAGAIN: Self = Self(-11);
    pub const ENOMEM: Self = Self(-12);
    pub const EFAULT: Self = Self(-14);
    pub const EBUSY: Self = Self(-16);
    pub const EINVAL: Self = Self(-22);
    pub const ENOSYS: Self = Self(-38);

    /// Map a raw hypercall return value to `Ok(value)` or an error.
    ///
    /// # Errors
    /// Any negative value is an error.
    #[inline]
    pub const fn check(ret: i64) -> Result<u64, Self> {
        if ret < 0 {
            Err(Self(ret))
        } else {
            Ok(ret.unsigned_abs())
        }
    }
}

/// Privileged operations the grant-table code depends on.
///
/// Batch operations take the whole slice in one call; per-record results are
/// written back into each record's `status` field. The `Err` value only
/// reports failure of the call as a whole.
pub trait Hypervisor {
    /// `GNTTABOP_query_size` for `query.dom`.
    ///
    /// # Errors
    /// The hypercall itself failed.
    fn query_size(&self, query: &mut QuerySize) -> Result<(), HypercallError>;

    /// `GNTTABOP_map_grant_ref` over the whole batch.
    ///
    /// # Errors
    /// The hypercall itself failed; per-record status is then undefined.
    fn map_grant_refs(&self, ops: &mut [MapGrantRef]) -> Result<(), HypercallError>;

    /// `GNTTABOP_unmap_grant_ref` over the whole batch.
    ///
    /// # Errors
    /// The hypercall itself failed; per-record status is then undefined.
    fn unmap_grant_refs(&self, ops: &mut [UnmapGrantRef]) -> Result<(), HypercallError>;

    /// `XENMEM_add_to_physmap`
    ///
    /// # Errors
    /// The frame could not be placed.
    fn add_to_physmap(&self, xatp: &AddToPhysmap) -> Result<(), HypercallError>;

    /// `XENMEM_remove_from_physmap`
    ///
    /// # Errors
    /// The frame could not be removed.
    fn remove_from_physmap(&self, xrfp: &RemoveFromPhysmap) -> Result<(), HypercallError>;

    /// `XENMEM_populate_physmap`; returns the number of extents populated,
    /// which may be fewer than requested.
    ///
    /// # Errors
    /// The hypercall itself failed.
    fn populate_physmap(&self, reservation: &MemoryReservation) -> Result<u64, HypercallError>;

    /// `CONSOLEIO_write` to the hypervisor's emergency console.
    ///
    /// # Errors
    /// The console is unavailable to this domain.
    fn console_write(&self, bytes: &[u8]) -> Result<(), HypercallError>;
}

impl<H: Hypervisor + ?Sized> Hypervisor for &H {
    fn query_size(&self, query: &mut QuerySize) -> Result<(), HypercallError> {
        (**self).query_size(query)
    }

    fn map_grant_refs(&self, ops: &mut [MapGrantRef]) -> Result<(), HypercallError> {
        (**self).map_grant_refs(ops)
    }

    fn unmap_grant_refs(&self, ops: &mut [UnmapGrantRef]) -> Result<(), HypercallError> {
        (**self).unmap_grant_refs(ops)
    }

    fn add_to_physmap(&self, xatp: &AddToPhysmap) -> Result<(), HypercallError> {
        (**self).add_to_physmap(xatp)
    }

    fn remove_from_physmap(&self, xrfp: &RemoveFromPhysmap) -> Result<(), HypercallError> {
        (**self).remove_from_physmap(xrfp)
    }

    fn populate_physmap(&self, reservation: &MemoryReservation) -> Result<u64, HypercallError> {
        (**self).populate_physmap(reservation)
    }

    fn console_write(&self, bytes: &[u8]) -> Result<(), HypercallError> {
        (**self).console_write(bytes)
    }
}
