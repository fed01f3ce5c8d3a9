#![allow(dead_code)]

use kernel_gnttab::{
    Delay, DeviceMapper, GfnTranslator, GrantTable, GrantTableConfig, PageAllocator,
};
use kernel_memory_addresses::{Gfn, PhysicalAddress, VirtualAddress, XEN_PAGE_SHIFT};
use kernel_xen::{
    AddToPhysmap, GrantStatus, HypercallError, Hypervisor, MapGrantRef, MemoryReservation,
    QuerySize, RemoveFromPhysmap, UnmapGrantRef,
};
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

pub const REGION: PhysicalAddress = PhysicalAddress::new(0x3800_0000);
pub const REGION_SIZE: u64 = 0x2_0000;

const PAGE: Layout = match Layout::from_size_align(4096, 4096) {
    Ok(layout) => layout,
    Err(_) => panic!("page layout"),
};

/// Mutable hypervisor state, inspected and scripted by tests.
#[derive(Default)]
pub struct HvState {
    /// `None` makes `query_size` fail.
    pub max_frames: Option<u32>,
    /// Status `query_size` reports; `Okay` when unset.
    pub query_status: Option<GrantStatus>,
    pub added: Vec<AddToPhysmap>,
    pub fail_add_at: Option<u64>,
    pub removed: HashSet<u64>,
    pub fail_remove: bool,
    pub fail_populate: bool,
    /// Statuses reported for successive submissions of a gref; `Okay` once
    /// the script runs dry.
    pub map_script: HashMap<u32, VecDeque<GrantStatus>>,
    /// Size of every `map_grant_refs` batch, in call order.
    pub map_batches: Vec<usize>,
    pub fail_map: bool,
    /// Reject `map_grant_refs` once this many batches have been accepted.
    pub fail_map_after: Option<usize>,
    pub unmap_batches: Vec<usize>,
}

#[derive(Default)]
pub struct MockHypervisor {
    state: Mutex<HvState>,
}

impl MockHypervisor {
    pub fn with_max_frames(max_frames: Option<u32>) -> Self {
        let hv = Self::default();
        hv.state().max_frames = max_frames;
        hv
    }

    pub fn state(&self) -> MutexGuard<'_, HvState> {
        self.state.lock().unwrap()
    }

    pub fn script(&self, gref: u32, statuses: impl IntoIterator<Item = GrantStatus>) {
        self.state()
            .map_script
            .insert(gref, statuses.into_iter().collect());
    }
}

impl Hypervisor for MockHypervisor {
    fn query_size(&self, query: &mut QuerySize) -> Result<(), HypercallError> {
        let state = self.state();
        let max = state.max_frames.ok_or(HypercallError::ENOSYS)?;
        query.nr_frames = 1;
        query.max_nr_frames = max;
        query.status = state.query_status.unwrap_or(GrantStatus::Okay).as_i16();
        Ok(())
    }

    fn map_grant_refs(&self, ops: &mut [MapGrantRef]) -> Result<(), HypercallError> {
        let mut state = self.state();
        let accepted = state.map_batches.len();
        if state.fail_map || state.fail_map_after.is_some_and(|n| accepted >= n) {
            return Err(HypercallError::EFAULT);
        }
        state.map_batches.push(ops.len());
        for (i, op) in ops.iter_mut().enumerate() {
            let status = state
                .map_script
                .get_mut(&op.gref.as_u32())
                .and_then(VecDeque::pop_front)
                .unwrap_or(GrantStatus::Okay);
            op.status = status.as_i16();
            if status == GrantStatus::Okay {
                op.handle = 0x100 + u32::try_from(i).unwrap();
            }
        }
        Ok(())
    }

    fn unmap_grant_refs(&self, ops: &mut [UnmapGrantRef]) -> Result<(), HypercallError> {
        self.state().unmap_batches.push(ops.len());
        for op in ops {
            op.status = GrantStatus::Okay.as_i16();
        }
        Ok(())
    }

    fn add_to_physmap(&self, xatp: &AddToPhysmap) -> Result<(), HypercallError> {
        let mut state = self.state();
        if state.fail_add_at == Some(xatp.idx) {
            return Err(HypercallError::EINVAL);
        }
        state.added.push(*xatp);
        Ok(())
    }

    fn remove_from_physmap(&self, xrfp: &RemoveFromPhysmap) -> Result<(), HypercallError> {
        let mut state = self.state();
        if state.fail_remove || !state.removed.insert(xrfp.gpfn) {
            return Err(HypercallError::EINVAL);
        }
        Ok(())
    }

    fn populate_physmap(&self, reservation: &MemoryReservation) -> Result<u64, HypercallError> {
        let mut state = self.state();
        if state.fail_populate {
            return Err(HypercallError::ENOMEM);
        }
        // SAFETY: callers keep the extent list alive across the call.
        let gfns = unsafe { reservation.extents() };
        let populated = gfns.iter().filter(|&&gfn| state.removed.remove(&gfn)).count();
        Ok(populated as u64)
    }

    fn console_write(&self, _: &[u8]) -> Result<(), HypercallError> {
        Ok(())
    }
}

/// Page allocator on the host heap with identity gfn translation.
#[derive(Default)]
pub struct MockMemory {
    live: Mutex<HashSet<u64>>,
    fail_alloc: AtomicBool,
}

impl MockMemory {
    pub fn is_live(&self, va: VirtualAddress) -> bool {
        self.live.lock().unwrap().contains(&va.as_u64())
    }

    pub fn live_pages(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub fn fail_alloc(&self, fail: bool) {
        self.fail_alloc.store(fail, Ordering::SeqCst);
    }
}

impl PageAllocator for MockMemory {
    fn alloc_page(&self) -> Option<VirtualAddress> {
        if self.fail_alloc.load(Ordering::SeqCst) {
            return None;
        }
        // SAFETY: non-zero size.
        let ptr = unsafe { alloc_zeroed(PAGE) };
        let va = VirtualAddress::from_ptr(ptr.cast_const());
        assert!(self.live.lock().unwrap().insert(va.as_u64()));
        Some(va)
    }

    unsafe fn free_page(&self, page: VirtualAddress) {
        assert!(
            self.live.lock().unwrap().remove(&page.as_u64()),
            "freeing {page} which is not allocated"
        );
        // SAFETY: allocated above with the same layout.
        unsafe { dealloc(page.as_mut_ptr::<u8>(), PAGE) };
    }
}

impl GfnTranslator for MockMemory {
    fn virt_to_gfn(&self, va: VirtualAddress) -> Gfn {
        Gfn::new(va.as_u64() >> XEN_PAGE_SHIFT)
    }
}

/// Records every sleep instead of sleeping.
#[derive(Default)]
pub struct MockDelay {
    sleeps: Mutex<Vec<u32>>,
}

impl MockDelay {
    pub fn sleeps(&self) -> Vec<u32> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Delay for MockDelay {
    fn sleep_ms(&self, ms: u32) {
        self.sleeps.lock().unwrap().push(ms);
    }
}

/// Backs the table region with leaked, zeroed host memory.
#[derive(Default)]
pub struct MockDeviceMapper {
    pub mapped: Mutex<Vec<(PhysicalAddress, u64)>>,
}

// SAFETY: the mapping is leaked and therefore valid forever.
unsafe impl DeviceMapper for MockDeviceMapper {
    fn map_device(&self, base: PhysicalAddress, len: u64) -> VirtualAddress {
        self.mapped.lock().unwrap().push((base, len));
        let layout = Layout::from_size_align(usize::try_from(len).unwrap(), 4096).unwrap();
        // SAFETY: non-zero size; never freed.
        VirtualAddress::from_ptr(unsafe { alloc_zeroed(layout) }.cast_const())
    }
}

pub type TestTable = GrantTable<&'static MockHypervisor, &'static MockMemory, &'static MockDelay>;

/// Platform mocks for one table; leaked so the table can borrow them.
pub struct Harness {
    pub hv: &'static MockHypervisor,
    pub mem: &'static MockMemory,
    pub delay: &'static MockDelay,
    pub mapper: MockDeviceMapper,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_max_frames(Some(32))
    }

    pub fn with_max_frames(max_frames: Option<u32>) -> Self {
        Self {
            hv: Box::leak(Box::new(MockHypervisor::with_max_frames(max_frames))),
            mem: Box::leak(Box::default()),
            delay: Box::leak(Box::default()),
            mapper: MockDeviceMapper::default(),
        }
    }

    pub fn config() -> GrantTableConfig {
        GrantTableConfig::new(REGION, REGION_SIZE)
    }

    pub fn init(&self) -> TestTable {
        GrantTable::init(self.hv, self.mem, self.delay, &self.mapper, &Self::config())
    }
}

/// A fully initialised table plus its mocks.
pub fn table() -> (Harness, TestTable) {
    let harness = Harness::new();
    let table = harness.init();
    (harness, table)
}
