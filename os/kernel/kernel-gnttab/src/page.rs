//! Pages shared with, or borrowed from, other domains.
//!
//! Both handle types own their page: they are neither `Copy` nor `Clone`,
//! and the only way to give the page back is through the table.

use crate::error::GrantError;
use crate::platform::{GfnTranslator, PageAllocator};
use crate::table::GrantTable;
use kernel_memory_addresses::{Gfn, VirtualAddress};
use kernel_xen::{
    DOMID_0, DOMID_SELF, DomId, GrantRef, Hypervisor, MapFlags, MapGrantRef, MemoryReservation,
    RemoveFromPhysmap,
};
use log::warn;

/// A locally allocated page granted to another domain.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping the handle leaks the page and its grant"]
pub struct GrantedPage {
    page: VirtualAddress,
    gref: GrantRef,
}

impl GrantedPage {
    #[inline]
    pub const fn addr(&self) -> VirtualAddress {
        self.page
    }

    /// The reference to hand to the remote domain.
    #[inline]
    pub const fn gref(&self) -> GrantRef {
        self.gref
    }
}

/// A page whose backing frame was returned to the hypervisor, ready to have a
/// foreign grant mapped into it.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "dropping the handle leaks the page"]
pub struct ForeignPage {
    page: VirtualAddress,
    gfn: Gfn,
}

impl ForeignPage {
    #[inline]
    pub const fn addr(&self) -> VirtualAddress {
        self.page
    }

    #[inline]
    pub const fn gfn(&self) -> Gfn {
        self.gfn
    }

    /// A map request placing `gref` of domain `dom` at this page.
    pub const fn map_request(&self, gref: GrantRef, dom: DomId, readonly: bool) -> MapGrantRef {
        let flags = MapFlags::new().with_host_map(true).with_readonly(readonly);
        MapGrantRef::new(self.gfn.base().as_u64(), flags, gref, dom)
    }
}

impl<H, M, D> GrantTable<H, M, D>
where
    H: Hypervisor,
    M: PageAllocator + GfnTranslator,
{
    /// Allocate a page and grant the control domain access to it.
    ///
    /// # Errors
    /// [`GrantError::OutOfMemory`] if no page is available; no reference is
    /// consumed in that case.
    pub fn alloc_and_grant(&self, readonly: bool) -> Result<GrantedPage, GrantError> {
        let page = self.mem.alloc_page().ok_or(GrantError::OutOfMemory)?;
        let gfn = self.mem.virt_to_gfn(page);
        let gref = self.grant_access(DOMID_0, gfn, readonly);
        Ok(GrantedPage { page, gref })
    }

    /// Revoke the grant on a page from [`alloc_and_grant`](Self::alloc_and_grant)
    /// and free the page.
    ///
    /// # Errors
    /// Hands the page back while the remote domain still maps it.
    pub fn end_access_and_free(&self, granted: GrantedPage) -> Result<(), GrantedPage> {
        if self.end_access(granted.gref).is_err() {
            return Err(granted);
        }

        // SAFETY: the page came from `alloc_page` and the handle is consumed.
        unsafe { self.mem.free_page(granted.page) };
        Ok(())
    }

    /// Allocate a page and release its frame to the hypervisor so a foreign
    /// grant can be mapped in its place.
    ///
    /// # Errors
    /// [`GrantError::OutOfMemory`] if no page is available, or
    /// [`GrantError::RemoveFromPhysmap`] if the hypervisor refused the frame.
    /// The page is freed again in the latter case.
    pub fn get_page(&self) -> Result<ForeignPage, GrantError> {
        let Some(page) = self.mem.alloc_page() else {
            warn!("Failed to allocate memory for gnttab page!");
            return Err(GrantError::OutOfMemory);
        };

        let gfn = self.mem.virt_to_gfn(page);
        if let Err(error) = self
            .hv
            .remove_from_physmap(&RemoveFromPhysmap::new(DOMID_SELF, gfn))
        {
            warn!("Failed to remove gnttab page from physmap, ret = {error}");
            // SAFETY: the frame is still ours and nothing else references it.
            unsafe { self.mem.free_page(page) };
            return Err(GrantError::RemoveFromPhysmap { gfn, error });
        }

        Ok(ForeignPage { page, gfn })
    }

    /// Repopulate the frame of a page from [`get_page`](Self::get_page) and
    /// free it. Any foreign grant mapped there must be unmapped first.
    ///
    /// # Errors
    /// [`GrantError::PopulatePhysmap`] if the frame could not be restored.
    /// The page is then leaked: freeing it would hand out memory with no
    /// backing frame.
    pub fn put_page(&self, page: ForeignPage) -> Result<(), GrantError> {
        let gfns = [page.gfn.as_u64()];
        let reservation = MemoryReservation::order0(DOMID_SELF, &gfns);

        let ret = match self.hv.populate_physmap(&reservation) {
            Ok(1) => {
                // SAFETY: the frame is backed again and the handle is consumed.
                unsafe { self.mem.free_page(page.page) };
                return Ok(());
            }
            Ok(populated) => populated.cast_signed(),
            Err(e) => e.0,
        };

        warn!("Failed to populate physmap on {}, ret = {ret}", page.gfn);
        Err(GrantError::PopulatePhysmap { gfn: page.gfn, ret })
    }
}
