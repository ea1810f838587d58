//! Error kinds shared by every module of the PM data engine.
//!
//! Follows the teacher's per-domain-error-enum pattern: a single marker
//! trait ([`BaseError`]) that every error type implements, plus a
//! `Result`-without-a-value alias ([`CanFail`]) for operations that either
//! succeed or fail without producing a value.

use core::fmt::Debug;

/// Implemented by every error type in this crate.
pub trait BaseError: Debug {}

/// Return type for operations that are allowed to fail but do not produce a
/// value on success, e.g. `truncate_add` or `gc`.
pub type CanFail<T> = Result<(), T>;

/// The error kinds produced by the PM data engine.
///
/// Each variant corresponds to one of the kinds named in the error-handling
/// design: `NoSpace`, `Corrupt`, `BadInode`, `AccessDenied` and `Transient`,
/// plus `HeightOverflow`, which `alloc_blocks` needs to distinguish
/// internally from a plain allocator `NoSpace` (both still surface to
/// userspace as `ENOSPC`) in order to decide whether to set `EOFBLOCKS_FL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmfsError {
    /// The allocator has no more data, meta or log blocks to hand out.
    NoSpace,
    /// The requested range would need the tree to grow taller than the
    /// maximum supported height (3).
    HeightOverflow,
    /// An on-PM invariant was violated during a tree, log or directory
    /// walk. Carries a short, static description for diagnostics.
    Corrupt(&'static str),
    /// The inode table slot addressed by an inode number fails the `active`
    /// predicate (unallocated, or allocated but deleted).
    BadInode,
    /// The basic inode (root / inode-table / block-node) named by the
    /// superblock is not present on the mapped PM region.
    AccessDenied,
    /// The journal has no transaction available right now; the caller
    /// should retry.
    Transient,
}

impl BaseError for PmfsError {}

impl core::fmt::Display for PmfsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PmfsError::NoSpace => write!(f, "no space left on device"),
            PmfsError::HeightOverflow => write!(f, "file would exceed maximum tree height"),
            PmfsError::Corrupt(what) => write!(f, "corrupt: {what}"),
            PmfsError::BadInode => write!(f, "inode is not active"),
            PmfsError::AccessDenied => write!(f, "basic inode missing"),
            PmfsError::Transient => write!(f, "no journal transaction available"),
        }
    }
}

impl PmfsError {
    /// Maps this error to the `NoSpace` kind it is user-visible as
    /// (`HeightOverflow` and `NoSpace` both surface as `ENOSPC`).
    #[must_use]
    pub fn is_enospc(self) -> bool {
        matches!(self, PmfsError::NoSpace | PmfsError::HeightOverflow)
    }
}
