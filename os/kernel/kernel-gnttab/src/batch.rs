//! Batched mapping of foreign grants.
//!
//! The hypervisor processes a batch record by record and reports a status in
//! each. `GNTST_eagain` means the granting domain's page is temporarily
//! unavailable (e.g. paged out); such records are resubmitted one at a time
//! with a linearly growing sleep until they settle or the step reaches
//! [`GOP_RETRY_DELAY_MS`], at which point they are failed with
//! `GNTST_bad_page`.

use crate::error::GrantError;
use crate::platform::Delay;
use crate::table::GrantTable;
use core::slice;
use kernel_xen::{GrantStatus, Hypervisor, MapGrantRef, UnmapGrantRef};
use log::{error, warn};

/// Once the sleep step reaches this many milliseconds a record still
/// reporting `eagain` is failed.
pub const GOP_RETRY_DELAY_MS: u32 = 200;

/// Increment of the sleep between two resubmissions.
pub const GOP_RETRY_STEP_MS: u32 = 10;

impl<H: Hypervisor, M, D: Delay> GrantTable<H, M, D> {
    /// Map a batch of foreign grants.
    ///
    /// Per-record outcomes are left in each record's `status`; no record is
    /// left at `eagain`. `no_device_space` is logged and reported as is.
    ///
    /// # Errors
    /// The hypercall itself was rejected; record statuses are then
    /// unspecified.
    pub fn map_refs(&self, ops: &mut [MapGrantRef]) -> Result<(), GrantError> {
        self.hv.map_grant_refs(ops)?;

        let mut i = 0;
        while i < ops.len() {
            match ops[i].status() {
                Some(GrantStatus::NoDeviceSpace) => {
                    warn!(
                        "map_grant_ref failed, no device space for page #{i}, {}",
                        ops[i].gref
                    );
                }
                Some(GrantStatus::Eagain) => {
                    self.eagain_retry(&mut ops[i]);
                    // look at the settled status again
                    continue;
                }
                _ => {}
            }
            i += 1;
        }

        Ok(())
    }

    /// Unmap a batch of grants mapped through [`map_refs`](Self::map_refs).
    ///
    /// # Errors
    /// The hypercall itself was rejected.
    pub fn unmap_refs(&self, ops: &mut [UnmapGrantRef]) -> Result<(), GrantError> {
        self.hv.unmap_grant_refs(ops)?;
        Ok(())
    }

    fn eagain_retry(&self, op: &mut MapGrantRef) {
        let mut delay = GOP_RETRY_STEP_MS;
        loop {
            if let Err(e) = self.hv.map_grant_refs(slice::from_mut(op)) {
                error!("Failed to resubmit map of {}: {e}", op.gref);
                op.status = GrantStatus::GeneralError.as_i16();
                return;
            }
            if op.status() != Some(GrantStatus::Eagain) {
                return;
            }

            self.delay.sleep_ms(delay);
            delay += GOP_RETRY_STEP_MS;
            if delay >= GOP_RETRY_DELAY_MS {
                break;
            }
        }

        error!("Failed to map {}, timeout reached", op.gref);
        op.status = GrantStatus::BadPage.as_i16();
    }
}
