use crate::allocator::GrefAllocator;
use crate::entry::GrantEntryV1;
use crate::error::GrantError;
use crate::{GNTTAB_NR_RESERVED_ENTRIES, NR_GRANT_ENTRIES};
use kernel_memory_addresses::Gfn;
use kernel_xen::{DomId, GrantFlags, GrantRef};
use log::warn;

/// The guest's grant table together with the services it depends on.
///
/// Built once by [`GrantTable::init`]; every operation takes `&self` and may
/// be called concurrently.
pub struct GrantTable<H, M, D> {
    pub(crate) entries: &'static [GrantEntryV1],
    pub(crate) grefs: GrefAllocator<NR_GRANT_ENTRIES>,
    pub(crate) hv: H,
    pub(crate) mem: M,
    pub(crate) delay: D,
}

impl<H, M, D> GrantTable<H, M, D> {
    /// Grant `domid` access to `gfn` and return the reference to share.
    ///
    /// Waits for a free reference if the table is exhausted.
    ///
    /// # Panics
    /// `gfn` does not fit a v1 grant entry; no reference is taken.
    pub fn grant_access(&self, domid: DomId, gfn: Gfn, readonly: bool) -> GrantRef {
        assert!(gfn.try_as_u32().is_some(), "{gfn} does not fit a v1 grant entry");
        let gref = self.grefs.acquire();
        self.entry(gref).permit_access(domid, gfn, readonly);
        gref
    }

    /// Allocate a reference without granting anything yet.
    ///
    /// Fill it in with [`grant_access_ref`](Self::grant_access_ref) and give
    /// it back with [`end_access`](Self::end_access).
    #[must_use]
    pub fn claim_ref(&self) -> Option<GrantRef> {
        self.grefs.try_acquire()
    }

    /// Grant access through a reference obtained from
    /// [`claim_ref`](Self::claim_ref).
    ///
    /// # Panics
    /// `gref` is not currently allocated.
    pub fn grant_access_ref(&self, gref: GrantRef, domid: DomId, gfn: Gfn, readonly: bool) {
        assert!(self.grefs.is_in_use(gref), "{gref} is not allocated");
        self.entry(gref).permit_access(domid, gfn, readonly);
    }

    /// Revoke the grant behind `gref` and free the reference.
    ///
    /// Fails with [`GrantError::StillInUse`] while the remote domain has the
    /// frame mapped; the entry and the reference are left untouched so the
    /// call can be retried.
    ///
    /// # Panics
    /// `gref` is reserved or outside the table.
    pub fn end_access(&self, gref: GrantRef) -> Result<(), GrantError> {
        if let Err(flags) = self.entry(gref).try_reset() {
            warn!("{gref} still in use! (flags = {:#x})", flags.into_bits());
            return Err(GrantError::StillInUse(gref));
        }

        self.grefs.release(gref);
        Ok(())
    }

    /// Current flags of the entry behind `gref`.
    ///
    /// # Panics
    /// `gref` is reserved or outside the table.
    #[must_use]
    pub fn query_flags(&self, gref: GrantRef) -> GrantFlags {
        self.entry(gref).flags()
    }

    /// The shared entry behind `gref`.
    ///
    /// # Panics
    /// `gref` is reserved or outside the table.
    #[must_use]
    pub fn entry(&self, gref: GrantRef) -> &GrantEntryV1 {
        assert!(
            gref.as_u32() >= GNTTAB_NR_RESERVED_ENTRIES && gref.as_usize() < self.entries.len(),
            "invalid {gref}"
        );
        &self.entries[gref.as_usize()]
    }

    /// Number of references that can be granted without waiting.
    #[must_use]
    pub fn available(&self) -> usize {
        self.grefs.available()
    }

    /// Total number of grantable references.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.grefs.capacity()
    }

    /// The hypervisor interface the table was built with.
    #[must_use]
    pub const fn hypervisor(&self) -> &H {
        &self.hv
    }
}
