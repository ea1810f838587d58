//! Journal contract (consumed, out of scope per spec §1/§6): a small
//! multi-record atomic journal used by the inode lifecycle (C9) to make a
//! handful of PM writes atomic (a new inode slot plus its directory entry,
//! a multi-field `setattr`, and so on).

use crate::error::PmfsError;

/// What a journalled write is updating, so a journal implementation can
/// choose redo vs. undo logging per record if it wants to; the core itself
/// treats this as opaque metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogEntryKind {
    Inode,
    DirEntry,
    Block,
}

/// Operations the inode lifecycle (C9) requires from a journal.
///
/// `T` is the implementation's transaction handle, opaque to the core.
pub trait Journal {
    type Transaction;

    /// Opens a transaction sized to hold at least `n_entries` journal
    /// records. Fails with [`PmfsError::Transient`] if no transaction slot
    /// is currently available (spec §7: "journal transaction unavailable —
    /// propagate to caller").
    fn new_transaction(&mut self, n_entries: usize) -> Result<Self::Transaction, PmfsError>;

    /// Records the pre-image of `size` bytes at PM `addr` into `txn` before
    /// the caller overwrites them in place.
    fn add_logentry(&mut self, txn: &mut Self::Transaction, addr: u64, size: usize, kind: LogEntryKind);

    /// Commits `txn`, making every recorded write durable as a unit.
    fn commit(&mut self, txn: Self::Transaction) -> Result<(), PmfsError>;
}
