//! Allocator facade (C2): the block allocator is deliberately out of scope
//! for this crate (see spec §1/§6) and is consumed here only through the
//! [`BlockAllocator`] trait, the same way the teacher keeps its physical
//! frame allocator behind [`crate::x86::paging::page_alloc::frame_alloc::FrameAllocator`]
//! rather than hard-wiring one allocator implementation into callers.

use crate::blocktype::BlockType;
use crate::error::PmfsError;

/// An opaque, allocator-owned hint that speeds up freeing blocks adjacent to
/// a previous allocation or free. The core never inspects a `Hint`'s
/// contents; it only stores and passes back whatever the allocator handed
/// out, exactly the "sticky pointer" contract in spec §6.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Hint(pub u64);

impl Hint {
    pub const NONE: Hint = Hint(0);
}

/// Operations the radix tree (C4), inode log (C5) and inode table (C6)
/// require from a block allocator.
///
/// All offsets are PM byte offsets (`0` reserved to mean "no block").
pub trait BlockAllocator {
    /// Allocates `num` data blocks of `btype`, writing their PM offsets into
    /// `out` (which must have length `>= num`). Returns the number of blocks
    /// actually allocated on partial failure alongside [`PmfsError::NoSpace`],
    /// matching the source's "allocate what you can, caller decides" policy
    /// used for `EOFBLOCKS_FL` marking in `alloc_blocks`.
    fn new_data_blocks(
        &mut self,
        out: &mut [u64],
        num: usize,
        btype: BlockType,
        zero: bool,
    ) -> Result<usize, PmfsError>;

    /// Allocates `num` 4 KiB meta blocks (radix nodes, log pages).
    fn new_meta_blocks(&mut self, out: &mut [u64], num: usize, zero: bool) -> Result<usize, PmfsError>;

    /// Frees one data block of `btype` at `blocknr`.
    fn free_data_block(&mut self, blocknr: u64, btype: BlockType);

    /// Frees one 4 KiB meta block at `blocknr`.
    fn free_meta_block(&mut self, blocknr: u64);

    /// Frees one log page, passing back the previous sticky hint and
    /// receiving an updated one to store alongside the log.
    fn free_log_block(&mut self, blocknr: u64, btype: BlockType, hint: Hint) -> Hint;
}
