use kernel_memory_addresses::Gfn;
use kernel_xen::{GrantRef, HypercallError};

/// Failures reported by the grant table.
///
/// Contract violations (invalid references, a table that cannot be set up)
/// panic instead; everything here is recoverable by the caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantError {
    /// The remote domain still has the granted frame mapped.
    #[error("{0} still in use")]
    StillInUse(GrantRef),

    /// No page could be allocated.
    #[error("out of memory")]
    OutOfMemory,

    /// A hypercall was rejected as a whole.
    #[error(transparent)]
    Hypercall(#[from] HypercallError),

    /// The page's frame could not be released to the hypervisor.
    #[error("failed to remove {gfn} from physmap: {error}")]
    RemoveFromPhysmap { gfn: Gfn, error: HypercallError },

    /// The page's frame could not be repopulated; the page was leaked.
    #[error("failed to populate physmap on {gfn}, ret = {ret}")]
    PopulatePhysmap { gfn: Gfn, ret: i64 },
}
