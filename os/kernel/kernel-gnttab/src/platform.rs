//! Services the grant table borrows from the surrounding kernel.

use kernel_memory_addresses::{Gfn, PhysicalAddress, VirtualAddress};

/// Page-granular allocator for the pages handed to other domains.
pub trait PageAllocator {
    /// Allocate one zeroed, page-aligned 4 KiB page.
    fn alloc_page(&self) -> Option<VirtualAddress>;

    /// Return a page to the allocator.
    ///
    /// # Safety
    /// `page` must come from [`alloc_page`](Self::alloc_page) on this
    /// allocator and must not be accessed afterwards.
    unsafe fn free_page(&self, page: VirtualAddress);
}

/// Guest-virtual to guest-frame translation.
pub trait GfnTranslator {
    fn virt_to_gfn(&self, va: VirtualAddress) -> Gfn;
}

/// Maps device memory into the kernel's address space.
///
/// # Safety
/// [`map_device`](Self::map_device) must return a mapping that is readable
/// and writable, page aligned and valid for `len` bytes for the remaining
/// lifetime of the kernel.
pub unsafe trait DeviceMapper {
    /// Map `len` bytes at `base` read-write and cacheable.
    fn map_device(&self, base: PhysicalAddress, len: u64) -> VirtualAddress;
}

/// Sleeps the calling context.
pub trait Delay {
    fn sleep_ms(&self, ms: u32);
}

impl<T: PageAllocator + ?Sized> PageAllocator for &T {
    fn alloc_page(&self) -> Option<VirtualAddress> {
        (**self).alloc_page()
    }

    unsafe fn free_page(&self, page: VirtualAddress) {
        // SAFETY: forwarded contract.
        unsafe { (**self).free_page(page) }
    }
}

impl<T: GfnTranslator + ?Sized> GfnTranslator for &T {
    fn virt_to_gfn(&self, va: VirtualAddress) -> Gfn {
        (**self).virt_to_gfn(va)
    }
}

impl<T: Delay + ?Sized> Delay for &T {
    fn sleep_ms(&self, ms: u32) {
        (**self).sleep_ms(ms);
    }
}
