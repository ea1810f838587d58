//! Hand-written test doubles shared by the integration suites, following
//! the teacher's preference for concrete fakes over a mocking crate.

use pmfs_core::alloc_facade::{BlockAllocator, Hint};
use pmfs_core::blocktype::BlockType;
use pmfs_core::error::PmfsError;
use pmfs_core::journal::{Journal, LogEntryKind};

/// A bump allocator handing out ever-increasing 4 KiB-aligned offsets,
/// tracking every block it was asked to free for assertions.
pub struct TestAllocator {
    next: u64,
    pub freed: Vec<u64>,
}

impl TestAllocator {
    #[must_use]
    pub fn new(start: u64) -> Self {
        Self { next: start, freed: Vec::new() }
    }
}

impl BlockAllocator for TestAllocator {
    fn new_data_blocks(&mut self, out: &mut [u64], num: usize, btype: BlockType, zero: bool) -> Result<usize, PmfsError> {
        let step = 1u64 << btype.shift();
        for slot in out.iter_mut().take(num) {
            self.next += step;
            *slot = self.next;
        }
        let _ = zero;
        Ok(num)
    }

    fn new_meta_blocks(&mut self, out: &mut [u64], num: usize, zero: bool) -> Result<usize, PmfsError> {
        let _ = zero;
        for slot in out.iter_mut().take(num) {
            self.next += 4096;
            *slot = self.next;
        }
        Ok(num)
    }

    fn free_data_block(&mut self, blocknr: u64, _btype: BlockType) {
        self.freed.push(blocknr);
    }

    fn free_meta_block(&mut self, blocknr: u64) {
        self.freed.push(blocknr);
    }

    fn free_log_block(&mut self, blocknr: u64, _btype: BlockType, hint: Hint) -> Hint {
        self.freed.push(blocknr);
        hint
    }
}

pub struct TestTransaction;

/// A journal that commits every transaction immediately, recording how
/// many records were added for assertions about call sites.
#[derive(Default)]
pub struct TestJournal {
    pub committed_entries: usize,
}

impl Journal for TestJournal {
    type Transaction = Vec<(u64, usize, LogEntryKind)>;

    fn new_transaction(&mut self, n_entries: usize) -> Result<Self::Transaction, PmfsError> {
        Ok(Vec::with_capacity(n_entries))
    }

    fn add_logentry(&mut self, txn: &mut Self::Transaction, addr: u64, size: usize, kind: LogEntryKind) {
        txn.push((addr, size, kind));
    }

    fn commit(&mut self, txn: Self::Transaction) -> Result<(), PmfsError> {
        self.committed_entries += txn.len();
        Ok(())
    }
}
