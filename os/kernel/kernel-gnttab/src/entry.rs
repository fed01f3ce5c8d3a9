use core::sync::atomic::{AtomicU16, AtomicU32, Ordering, fence};
use kernel_memory_addresses::Gfn;
use kernel_xen::{DomId, GrantFlags};

/// `struct grant_entry_v1`, as laid out in the shared table.
///
/// The hypervisor reads `domid` and `frame` once it observes a valid type in
/// `flags`, and it sets and clears the `reading`/`writing` bits of `flags`
/// while the remote domain maps the frame. All fields are therefore atomics.
#[repr(C)]
#[derive(Debug, Default)]
pub struct GrantEntryV1 {
    flags: AtomicU16,
    domid: AtomicU16,
    frame: AtomicU32,
}

const _: () = assert!(size_of::<GrantEntryV1>() == 8);

impl GrantEntryV1 {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flags: AtomicU16::new(0),
            domid: AtomicU16::new(0),
            frame: AtomicU32::new(0),
        }
    }

    /// Grant `domid` access to `gfn`.
    ///
    /// `frame` and `domid` become visible before `flags` does, so the
    /// hypervisor never acts on a half-written entry.
    ///
    /// # Panics
    /// If `gfn` does not fit the 32-bit frame field; the entry is left
    /// untouched.
    pub fn permit_access(&self, domid: DomId, gfn: Gfn, readonly: bool) {
        let Some(frame) = gfn.try_as_u32() else {
            panic!("{gfn} does not fit a v1 grant entry");
        };
        self.frame.store(frame, Ordering::Relaxed);
        self.domid.store(domid.as_u16(), Ordering::Relaxed);
        fence(Ordering::SeqCst);
        self.flags.store(
            GrantFlags::permit_access(readonly).into_bits(),
            Ordering::Release,
        );
    }

    /// Clear the entry unless the remote side is reading or writing it.
    ///
    /// Returns the flags that blocked the reset.
    pub fn try_reset(&self) -> Result<(), GrantFlags> {
        let mut current = self.flags.load(Ordering::Acquire);
        loop {
            let flags = GrantFlags::from_bits(current);
            if flags.in_use() {
                return Err(flags);
            }
            match self.flags.compare_exchange_weak(
                current,
                0,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => current = observed,
            }
        }
    }

    #[inline]
    pub fn flags(&self) -> GrantFlags {
        GrantFlags::from_bits(self.flags.load(Ordering::Acquire))
    }

    #[inline]
    pub fn domid(&self) -> DomId {
        DomId::new(self.domid.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn frame(&self) -> u32 {
        self.frame.load(Ordering::Relaxed)
    }

    /// The shared flags word itself.
    ///
    /// This is the word the hypervisor updates on behalf of the remote
    /// domain. Guest code changes it only through
    /// [`permit_access`](Self::permit_access) and
    /// [`try_reset`](Self::try_reset).
    #[inline]
    pub const fn flags_word(&self) -> &AtomicU16 {
        &self.flags
    }
}
