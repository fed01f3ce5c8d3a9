use crate::allocator::GrefAllocator;
use crate::entry::GrantEntryV1;
use crate::platform::DeviceMapper;
use crate::table::GrantTable;
use crate::{GNTTAB_NR_RESERVED_ENTRIES, GNTTAB_SIZE, NR_GRANT_ENTRIES, NR_GRANT_FRAMES};
use kernel_memory_addresses::PhysicalAddress;
use kernel_sync::SyncOnceCell;
use kernel_xen::{AddToPhysmap, DOMID_SELF, Hypervisor, QuerySize};
use log::{debug, error, info, warn};

/// Frame limit assumed when the hypervisor does not answer `query_size`.
pub const LEGACY_MAX_GRANT_FRAMES: u32 = 4;

/// Where the hypervisor should place the table.
///
/// On ARM the region comes from the `xen,xen` device-tree node; it must be
/// reserved guest-physical space with no RAM behind it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GrantTableConfig {
    pub region: PhysicalAddress,
    pub region_size: u64,
}

impl GrantTableConfig {
    #[must_use]
    pub const fn new(region: PhysicalAddress, region_size: u64) -> Self {
        Self {
            region,
            region_size,
        }
    }
}

fn query_max_frames<H: Hypervisor>(hv: &H) -> u32 {
    let mut query = QuerySize::new(DOMID_SELF);
    match hv.query_size(&mut query) {
        Ok(()) if query.status == 0 => query.max_nr_frames,
        Ok(()) => {
            warn!(
                "query_size status {}, assuming {LEGACY_MAX_GRANT_FRAMES} frames",
                query.status
            );
            LEGACY_MAX_GRANT_FRAMES
        }
        Err(e) => {
            warn!("query_size failed ({e}), assuming {LEGACY_MAX_GRANT_FRAMES} frames");
            LEGACY_MAX_GRANT_FRAMES
        }
    }
}

impl<H: Hypervisor, M, D> GrantTable<H, M, D> {
    /// Set up the grant table.
    ///
    /// Checks the hypervisor supports [`NR_GRANT_FRAMES`] frames, seeds the
    /// reference allocator, asks the hypervisor to place each table frame at
    /// `config.region` (last frame first) and maps the region.
    ///
    /// # Panics
    /// The region is too small or misaligned, the hypervisor supports too
    /// few frames, or it refuses to place a frame. The guest cannot share
    /// memory in any of these cases.
    pub fn init(
        hv: H,
        mem: M,
        delay: D,
        mapper: &impl DeviceMapper,
        config: &GrantTableConfig,
    ) -> Self {
        assert!(
            config.region.is_page_aligned(),
            "grant table region {} is not page aligned",
            config.region
        );
        assert!(
            config.region_size >= GNTTAB_SIZE,
            "grant table region holds {:#x} bytes, {GNTTAB_SIZE:#x} needed",
            config.region_size
        );

        let max_frames = query_max_frames(&hv);
        if (max_frames as usize) < NR_GRANT_FRAMES {
            error!("Hypervisor supports {max_frames} grant frames, {NR_GRANT_FRAMES} required");
            panic!("not enough grant frames");
        }

        let grefs = GrefAllocator::new(GNTTAB_NR_RESERVED_ENTRIES);

        let base = config.region.gfn();
        for idx in (0..NR_GRANT_FRAMES as u64).rev() {
            let xatp = AddToPhysmap::grant_table_frame(DOMID_SELF, idx, base + idx);
            if let Err(e) = hv.add_to_physmap(&xatp) {
                error!("add_to_physmap of grant frame {idx} failed: {e}");
                panic!("add_to_physmap failed");
            }
        }

        let va = mapper.map_device(config.region, GNTTAB_SIZE);
        assert!(va.is_page_aligned(), "grant table mapped at {va}");
        // SAFETY: `DeviceMapper` guarantees a permanent read-write mapping of
        // `GNTTAB_SIZE` bytes, exactly `NR_GRANT_ENTRIES` entries, all of
        // which are atomics.
        let entries =
            unsafe { core::slice::from_raw_parts(va.as_ptr::<GrantEntryV1>(), NR_GRANT_ENTRIES) };

        debug!("grant table at {} mapped to {va}", config.region);
        info!(
            "grant table ready: {NR_GRANT_FRAMES} of {max_frames} frames, {} references",
            grefs.capacity()
        );

        Self {
            entries,
            grefs,
            hv,
            mem,
            delay,
        }
    }
}

/// Start-of-day hook: initialise the guest's single grant table.
///
/// The slot is claimed before anything is asked of the hypervisor, so a
/// second call fails without side effects even while the first is running.
///
/// # Panics
/// The table was already initialised, or [`GrantTable::init`] panicked.
pub fn gnttab_init<H, M, D>(
    slot: &'static SyncOnceCell<GrantTable<H, M, D>>,
    hv: H,
    mem: M,
    delay: D,
    mapper: &impl DeviceMapper,
    config: &GrantTableConfig,
) -> &'static GrantTable<H, M, D>
where
    H: Hypervisor + Send + Sync,
    M: Send + Sync,
    D: Send + Sync,
{
    let table = slot.try_init(|| GrantTable::init(hv, mem, delay, mapper, config));
    let Some(table) = table else {
        panic!("grant table already initialised");
    };
    table
}
