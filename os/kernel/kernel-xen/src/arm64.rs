//! AArch64 hypercall transport.
//!
//! Xen on ARM takes the hypercall number in `x16`, up to five arguments in
//! `x0`–`x4`, and returns the result in `x0`. The immediate of the `hvc`
//! instruction is the Xen tag `0xEA1`.

use crate::grant_table::{
    GNTTABOP_MAP_GRANT_REF, GNTTABOP_QUERY_SIZE, GNTTABOP_UNMAP_GRANT_REF, MapGrantRef, QuerySize,
    UnmapGrantRef,
};
use crate::hypercall::{
    CONSOLEIO_WRITE, HYPERVISOR_CONSOLE_IO, HYPERVISOR_GRANT_TABLE_OP, HYPERVISOR_MEMORY_OP,
    HypercallError, Hypervisor,
};
use crate::memory::{
    AddToPhysmap, MemoryReservation, RemoveFromPhysmap, XENMEM_ADD_TO_PHYSMAP,
    XENMEM_POPULATE_PHYSMAP, XENMEM_REMOVE_FROM_PHYSMAP,
};

/// Issues real hypercalls with `hvc #0xEA1`.
///
/// Only valid when running as a Xen guest at EL1.
#[derive(Copy, Clone, Debug, Default)]
pub struct Arm64Hypervisor;

/// Xen does not preserve `x16` or the argument registers `x1`–`x4` across
/// the trap, so all of them are declared clobbered.
///
/// # Safety
/// Pointer arguments must reference memory valid for the operation, and the
/// call must be made from EL1 in a Xen guest.
#[inline]
unsafe fn hypercall3(nr: u64, a0: u64, a1: u64, a2: u64) -> i64 {
    let ret: i64;
    unsafe {
        core::arch::asm!(
            "hvc #0xEA1",
            inout("x16") nr => _,
            inlateout("x0") a0 => ret,
            inout("x1") a1 => _,
            inout("x2") a2 => _,
            out("x3") _,
            out("x4") _,
            options(nostack),
        );
    }
    ret
}

#[inline]
fn addr_of<T: ?Sized>(r: &T) -> u64 {
    core::ptr::from_ref(r).cast::<u8>() as usize as u64
}

impl Arm64Hypervisor {
    fn grant_table_op<T>(cmd: u32, ops: &mut [T]) -> Result<(), HypercallError> {
        let ptr = ops.as_mut_ptr() as usize as u64;
        // SAFETY: `ops` is a live, exclusively borrowed array of `T` records.
        let ret = unsafe {
            hypercall3(
                HYPERVISOR_GRANT_TABLE_OP,
                u64::from(cmd),
                ptr,
                ops.len() as u64,
            )
        };
        HypercallError::check(ret).map(|_| ())
    }

    fn memory_op<T>(cmd: u32, arg: &T) -> Result<u64, HypercallError> {
        // SAFETY: `arg` is a live `#[repr(C)]` record for `cmd`.
        let ret = unsafe { hypercall3(HYPERVISOR_MEMORY_OP, u64::from(cmd), addr_of(arg), 0) };
        HypercallError::check(ret)
    }
}

impl Hypervisor for Arm64Hypervisor {
    fn query_size(&self, query: &mut QuerySize) -> Result<(), HypercallError> {
        Self::grant_table_op(GNTTABOP_QUERY_SIZE, core::slice::from_mut(query))
    }

    fn map_grant_refs(&self, ops: &mut [MapGrantRef]) -> Result<(), HypercallError> {
        Self::grant_table_op(GNTTABOP_MAP_GRANT_REF, ops)
    }

    fn unmap_grant_refs(&self, ops: &mut [UnmapGrantRef]) -> Result<(), HypercallError> {
        Self::grant_table_op(GNTTABOP_UNMAP_GRANT_REF, ops)
    }

    fn add_to_physmap(&self, xatp: &AddToPhysmap) -> Result<(), HypercallError> {
        Self::memory_op(XENMEM_ADD_TO_PHYSMAP, xatp).map(|_| ())
    }

    fn remove_from_physmap(&self, xrfp: &RemoveFromPhysmap) -> Result<(), HypercallError> {
        Self::memory_op(XENMEM_REMOVE_FROM_PHYSMAP, xrfp).map(|_| ())
    }

    fn populate_physmap(&self, reservation: &MemoryReservation) -> Result<u64, HypercallError> {
        Self::memory_op(XENMEM_POPULATE_PHYSMAP, reservation)
    }

    fn console_write(&self, bytes: &[u8]) -> Result<(), HypercallError> {
        // SAFETY: `bytes` is readable for its whole length.
        let ret = unsafe {
            hypercall3(
                HYPERVISOR_CONSOLE_IO,
                CONSOLEIO_WRITE,
                bytes.len() as u64,
                addr_of(bytes),
            )
        };
        HypercallError::check(ret).map(|_| ())
    }
}
