mod common;

use common::table;
use kernel_gnttab::{
    DomId, GOP_RETRY_DELAY_MS, GOP_RETRY_STEP_MS, GrantError, GrantRef, GrantStatus, MapGrantRef,
    UnmapGrantRef,
};
use kernel_xen::HypercallError;
use kernel_xen::grant_table::MapFlags;

fn request(gref: u32) -> MapGrantRef {
    MapGrantRef::new(
        0x4000_0000 + u64::from(gref) * 0x1000,
        MapFlags::new().with_host_map(true),
        GrantRef::new(gref),
        DomId::new(1),
    )
}

fn statuses(ops: &[MapGrantRef]) -> Vec<Option<GrantStatus>> {
    ops.iter().map(MapGrantRef::status).collect()
}

#[test]
fn successful_batch_is_submitted_once() {
    let (h, table) = table();
    let mut ops = [request(10), request(11), request(12)];

    assert_eq!(table.map_refs(&mut ops), Ok(()));
    assert_eq!(statuses(&ops), [Some(GrantStatus::Okay); 3]);
    assert_eq!(h.hv.state().map_batches, [3]);
    assert!(h.delay.sleeps().is_empty());
}

#[test]
fn transient_eagain_is_retried_until_it_settles() {
    let (h, table) = table();
    h.hv.script(11, [GrantStatus::Eagain, GrantStatus::Eagain, GrantStatus::Eagain]);
    let mut ops = [request(10), request(11), request(12)];

    assert_eq!(table.map_refs(&mut ops), Ok(()));
    assert_eq!(statuses(&ops), [Some(GrantStatus::Okay); 3]);
    // one batch, then single-record resubmissions
    assert_eq!(h.hv.state().map_batches, [3, 1, 1, 1]);
    assert_eq!(h.delay.sleeps(), [10, 20]);
}

#[test]
fn persistent_eagain_becomes_bad_page() {
    let (h, table) = table();
    h.hv.script(11, std::iter::repeat_n(GrantStatus::Eagain, 100));
    let mut ops = [request(10), request(11), request(12)];

    assert_eq!(table.map_refs(&mut ops), Ok(()));
    assert_eq!(
        statuses(&ops),
        [
            Some(GrantStatus::Okay),
            Some(GrantStatus::BadPage),
            Some(GrantStatus::Okay)
        ]
    );

    let expected: Vec<u32> = (1..)
        .map(|n| n * GOP_RETRY_STEP_MS)
        .take_while(|&d| d < GOP_RETRY_DELAY_MS)
        .collect();
    assert_eq!(h.delay.sleeps(), expected);
    assert_eq!(*expected.last().unwrap(), 190);
    assert_eq!(h.hv.state().map_batches.len(), 1 + expected.len());
}

#[test]
fn rejected_resubmission_becomes_general_error() {
    let (h, table) = table();
    h.hv.script(11, [GrantStatus::Eagain]);
    h.hv.state().fail_map_after = Some(1);
    let mut ops = [request(10), request(11), request(12)];

    assert_eq!(table.map_refs(&mut ops), Ok(()));
    assert_eq!(
        statuses(&ops),
        [
            Some(GrantStatus::Okay),
            Some(GrantStatus::GeneralError),
            Some(GrantStatus::Okay)
        ]
    );
    assert_eq!(h.hv.state().map_batches, [3]);
    assert!(h.delay.sleeps().is_empty());
}

#[test]
fn no_device_space_is_reported_without_retry() {
    let (h, table) = table();
    h.hv.script(12, [GrantStatus::NoDeviceSpace]);
    let mut ops = [request(10), request(12)];

    assert_eq!(table.map_refs(&mut ops), Ok(()));
    assert_eq!(
        statuses(&ops),
        [Some(GrantStatus::Okay), Some(GrantStatus::NoDeviceSpace)]
    );
    assert_eq!(h.hv.state().map_batches, [2]);
}

#[test]
fn eagain_settling_on_no_device_space_is_reported() {
    let (h, table) = table();
    h.hv.script(10, [GrantStatus::Eagain, GrantStatus::NoDeviceSpace]);
    let mut ops = [request(10)];

    assert_eq!(table.map_refs(&mut ops), Ok(()));
    assert_eq!(statuses(&ops), [Some(GrantStatus::NoDeviceSpace)]);
    assert!(h.delay.sleeps().is_empty());
}

#[test]
fn rejected_batch_is_an_error() {
    let (h, table) = table();
    h.hv.state().fail_map = true;
    let mut ops = [request(10)];

    assert_eq!(
        table.map_refs(&mut ops),
        Err(GrantError::Hypercall(HypercallError::EFAULT))
    );
}

#[test]
fn unmap_is_a_single_pass_through() {
    let (h, table) = table();
    let mut maps = [request(10), request(11)];
    table.map_refs(&mut maps).unwrap();

    let mut unmaps = maps.map(|m| UnmapGrantRef::for_mapping(&m));
    assert_eq!(unmaps[1].handle, maps[1].handle);
    assert_eq!(table.unmap_refs(&mut unmaps), Ok(()));
    assert!(unmaps.iter().all(|u| u.status() == Some(GrantStatus::Okay)));
    assert_eq!(h.hv.state().unmap_batches, [2]);
}
