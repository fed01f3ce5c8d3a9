//! `GNTTABOP_*` records and constants (`xen/include/public/grant_table.h`).

use crate::DomId;
use bitfield_struct::bitfield;
use core::fmt;

/// `GNTTABOP_map_grant_ref`
pub const GNTTABOP_MAP_GRANT_REF: u32 = 0;
/// `GNTTABOP_unmap_grant_ref`
pub const GNTTABOP_UNMAP_GRANT_REF: u32 = 1;
/// `GNTTABOP_query_size`
pub const GNTTABOP_QUERY_SIZE: u32 = 6;

/// Grant reference: index of an entry in the shared grant table.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GrantRef(u32);

impl GrantRef {
    #[inline]
    #[must_use]
    pub const fn new(r: u32) -> Self {
        Self(r)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for GrantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GrantRef({})", self.0)
    }
}

impl fmt::Display for GrantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gref {}", self.0)
    }
}

/// Entry type stored in bits 0–1 of [`GrantFlags`].
pub mod gtf_type {
    /// Entry is unused.
    pub const INVALID: u8 = 0;
    /// Remote domain may map or access the frame.
    pub const PERMIT_ACCESS: u8 = 1;
    /// Remote domain may transfer ownership of a frame to us.
    pub const ACCEPT_TRANSFER: u8 = 2;
    /// Transitive grant (v2 only).
    pub const TRANSITIVE: u8 = 3;
}

/// `flags` field of a v1 grant entry (`GTF_*`).
///
/// The guest writes `kind` and `readonly`; the hypervisor sets and clears
/// `reading`/`writing` while the remote domain has the frame mapped.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct GrantFlags {
    /// Bits 0–1: entry type, see [`gtf_type`].
    #[bits(2)]
    pub kind: u8,

    /// Bit 2: `GTF_readonly`: remote side may only map read-only.
    pub readonly: bool,

    /// Bit 3: `GTF_reading`: remote side currently has the frame mapped.
    pub reading: bool,

    /// Bit 4: `GTF_writing`: remote side currently has it mapped writable.
    pub writing: bool,

    /// Bit 5: `GTF_PWT`
    pub pwt: bool,

    /// Bit 6: `GTF_PCD`
    pub pcd: bool,

    /// Bit 7: `GTF_PAT`
    pub pat: bool,

    /// Bit 8: `GTF_sub_page` (v2 only).
    pub sub_page: bool,

    /// Bits 9–15: reserved.
    #[bits(7)]
    pub reserved: u8,
}

impl GrantFlags {
    /// Flags granting access, optionally read-only.
    #[must_use]
    pub const fn permit_access(readonly: bool) -> Self {
        Self::new()
            .with_kind(gtf_type::PERMIT_ACCESS)
            .with_readonly(readonly)
    }

    /// `true` while the remote domain holds a mapping of the frame.
    #[must_use]
    pub const fn in_use(self) -> bool {
        self.reading() || self.writing()
    }
}

/// `GNTMAP_*` flags of a map request.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct MapFlags {
    /// Bit 0: `GNTMAP_device_map`
    pub device_map: bool,
    /// Bit 1: `GNTMAP_host_map`
    pub host_map: bool,
    /// Bit 2: `GNTMAP_readonly`
    pub readonly: bool,
    /// Bit 3: `GNTMAP_application_map`
    pub application_map: bool,
    /// Bit 4: `GNTMAP_contains_pte`
    pub contains_pte: bool,
    #[bits(27)]
    pub reserved: u32,
}

/// Status codes written into per-record `status` fields (`GNTST_*`).
#[repr(i16)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GrantStatus {
    Okay = 0,
    GeneralError = -1,
    BadDomain = -2,
    BadGntRef = -3,
    BadHandle = -4,
    BadVirtAddr = -5,
    BadDevAddr = -6,
    NoDeviceSpace = -7,
    PermissionDenied = -8,
    BadPage = -9,
    BadCopyArg = -10,
    AddressTooBig = -11,
    Eagain = -12,
    NoSpace = -13,
}

impl GrantStatus {
    #[inline]
    #[must_use]
    pub const fn as_i16(self) -> i16 {
        self as i16
    }

    /// Decode a raw status; unknown codes yield `None`.
    #[must_use]
    pub const fn from_i16(raw: i16) -> Option<Self> {
        Some(match raw {
            0 => Self::Okay,
            -1 => Self::GeneralError,
            -2 => Self::BadDomain,
            -3 => Self::BadGntRef,
            -4 => Self::BadHandle,
            -5 => Self::BadVirtAddr,
            -6 => Self::BadDevAddr,
            -7 => Self::NoDeviceSpace,
            -8 => Self::PermissionDenied,
            -9 => Self::BadPage,
            -10 => Self::BadCopyArg,
            -11 => Self::AddressTooBig,
            -12 => Self::Eagain,
            -13 => Self::NoSpace,
            _ => return None,
        })
    }
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(gnttabop_error(self.as_i16()))
    }
}

/// `GNTTABOP_error_msgs`, indexed by the negated status.
const GNTTABOP_ERROR_MSGS: [&str; 14] = [
    "okay",
    "undefined error",
    "unrecognised domain id",
    "invalid grant reference",
    "invalid mapping handle",
    "invalid virtual address",
    "invalid device address",
    "no spare translation slot in the I/O MMU",
    "permission denied",
    "bad page",
    "copy arguments cross page boundary",
    "page address size too large",
    "operation not done; try again",
    "out of space",
];

/// Human readable text for a raw grant-table status.
///
/// ```rust
/// # use kernel_xen::gnttabop_error;
/// assert_eq!(gnttabop_error(-12), "operation not done; try again");
/// assert_eq!(gnttabop_error(1), "bad status");
/// ```
#[must_use]
pub fn gnttabop_error(status: i16) -> &'static str {
    i16::checked_neg(status)
        .and_then(|n| usize::try_from(n).ok())
        .and_then(|n| GNTTABOP_ERROR_MSGS.get(n).copied())
        .unwrap_or("bad status")
}

/// `struct gnttab_map_grant_ref`
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MapGrantRef {
    /// IN: where to map (or the PTE address with `contains_pte`).
    pub host_addr: u64,
    /// IN: raw [`MapFlags`].
    pub flags: u32,
    /// IN: reference in the granting domain's table.
    pub gref: GrantRef,
    /// IN: granting domain.
    pub dom: DomId,
    /// OUT: raw [`GrantStatus`].
    pub status: i16,
    /// OUT: handle to pass to unmap.
    pub handle: u32,
    /// OUT: bus address for device mappings.
    pub dev_bus_addr: u64,
}

const _: () = assert!(size_of::<MapGrantRef>() == 32);

impl MapGrantRef {
    #[must_use]
    pub const fn new(host_addr: u64, flags: MapFlags, gref: GrantRef, dom: DomId) -> Self {
        Self {
            host_addr,
            flags: flags.into_bits(),
            gref,
            dom,
            status: GrantStatus::Okay.as_i16(),
            handle: 0,
            dev_bus_addr: 0,
        }
    }

    /// Decoded status; `None` for codes outside the known set.
    #[must_use]
    pub const fn status(&self) -> Option<GrantStatus> {
        GrantStatus::from_i16(self.status)
    }
}

/// `struct gnttab_unmap_grant_ref`
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct UnmapGrantRef {
    pub host_addr: u64,
    pub dev_bus_addr: u64,
    pub handle: u32,
    /// OUT: raw [`GrantStatus`].
    pub status: i16,
}

const _: () = assert!(size_of::<UnmapGrantRef>() == 24);

impl UnmapGrantRef {
    #[must_use]
    pub const fn new(host_addr: u64, handle: u32) -> Self {
        Self {
            host_addr,
            dev_bus_addr: 0,
            handle,
            status: GrantStatus::Okay.as_i16(),
        }
    }

    /// Build the matching unmap for a completed map request.
    #[must_use]
    pub const fn for_mapping(map: &MapGrantRef) -> Self {
        Self {
            host_addr: map.host_addr,
            dev_bus_addr: map.dev_bus_addr,
            handle: map.handle,
            status: GrantStatus::Okay.as_i16(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> Option<GrantStatus> {
        GrantStatus::from_i16(self.status)
    }
}

/// `struct gnttab_query_size`
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct QuerySize {
    /// IN: domain to query.
    pub dom: DomId,
    /// OUT: frames currently in use.
    pub nr_frames: u32,
    /// OUT: maximum frames the domain may use.
    pub max_nr_frames: u32,
    /// OUT: raw [`GrantStatus`].
    pub status: i16,
}

const _: () = assert!(size_of::<QuerySize>() == 16);

impl QuerySize {
    #[must_use]
    pub const fn new(dom: DomId) -> Self {
        Self {
            dom,
            nr_frames: 0,
            max_nr_frames: 0,
            status: GrantStatus::Okay.as_i16(),
        }
    }
}
