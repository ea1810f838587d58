//! Inode table (C6): a linear slab of 128-byte inode slots addressed by
//! `ino * INODE_SIZE`, backed by a distinguished inode whose own file tree
//! holds the slots (spec §4.3).
//!
//! The table inode's tree lives outside this module (it is grown via
//! [`crate::tree::alloc_blocks`] like any other file); this module only
//! implements the free-hint search and growth bookkeeping layered on top.

use bytemuck::{bytes_of, from_bytes};

use crate::alloc_facade::BlockAllocator;
use crate::blocktype::BlockType;
use crate::error::PmfsError;
use crate::inode::RawInode;
use crate::params::{INODES_PER_4K_PAGE, INODE_SIZE};
use crate::pm::{self, PmRegion};
use crate::protect::ProtectionGate;
use crate::tree::{self, LeafKind, TreeRoot};

/// Inode number 0 is reserved and never handed out (spec §3 "Inode table").
pub const RESERVED_SLOT: u64 = 0;

fn slot_byte_offset(ino: u64) -> u64 {
    ino * INODE_SIZE as u64
}

/// Resolves the PM offset of inode slot `ino`'s 128-byte record inside the
/// table inode's tree, or `0` if it falls in an unallocated page.
fn slot_pm_offset<R: PmRegion + ?Sized>(pm: &R, table_tree: TreeRoot, ino: u64) -> u64 {
    let byte_off = slot_byte_offset(ino);
    let page_blocknr = byte_off / crate::params::META_BLOCK_SIZE as u64;
    let within_page = byte_off % crate::params::META_BLOCK_SIZE as u64;
    let page = tree::find_data_block(pm, table_tree, BlockType::Block4K, page_blocknr);
    if page == 0 {
        return 0;
    }
    page + within_page
}

fn read_slot<R: PmRegion + ?Sized>(pm: &R, table_tree: TreeRoot, ino: u64) -> Option<RawInode> {
    let off = slot_pm_offset(pm, table_tree, ino);
    if off == 0 {
        return None;
    }
    Some(*from_bytes(pm.slice(off, INODE_SIZE)))
}

fn write_slot<R: PmRegion + ?Sized, G: ProtectionGate>(pm: &R, gate: &G, table_tree: TreeRoot, ino: u64, slot: &RawInode) {
    let off = slot_pm_offset(pm, table_tree, ino);
    gate.unlocked(off, INODE_SIZE, || {
        pm.slice_mut(off, INODE_SIZE).copy_from_slice(bytes_of(slot));
    });
    pm::flush_and_fence(pm, off, INODE_SIZE);
}

/// Per-superblock bookkeeping for the table (spec §4.3: `s_free_inode_hint`,
/// `s_free_inodes_count`, `s_inodes_count`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableState {
    pub tree: TreeRoot,
    pub free_hint: u64,
    pub free_inodes_count: u64,
    pub inodes_count: u64,
}

/// Allocates a free inode slot under the caller's `inode_table_mutex`
/// equivalent (the caller is expected to hold whatever lock wraps this
/// call; this crate does not itself take one since allocation policy is a
/// single-writer critical section by construction). Clears the slot to
/// `blk_type`/height-0/empty-log and returns `(ino, updated TableState)`
/// (spec §4.3 steps 1-4).
pub fn alloc_inode<R, A, G>(pm: &R, alloc: &mut A, gate: &G, state: TableState, blk_type: BlockType, max_height: u8) -> Result<(u64, TableState), PmfsError>
where
    R: PmRegion + ?Sized,
    A: BlockAllocator,
    G: ProtectionGate,
{
    let mut ino = state.free_hint.max(1);

    loop {
        if ino >= state.inodes_count {
            return grow_and_alloc(pm, alloc, gate, state, blk_type, max_height);
        }

        let page_start = ino - (ino % INODES_PER_4K_PAGE as u64);
        let page_end = (page_start + INODES_PER_4K_PAGE as u64).min(state.inodes_count);

        for candidate in ino.max(page_start)..page_end {
            if candidate == RESERVED_SLOT {
                continue;
            }
            let slot = read_slot(pm, state.tree, candidate).unwrap_or_default();
            if slot.is_free() {
                write_slot(pm, gate, state.tree, candidate, &RawInode::fresh(blk_type));
                let new_state = TableState {
                    free_hint: candidate + 1,
                    free_inodes_count: state.free_inodes_count.saturating_sub(1),
                    ..state
                };
                return Ok((candidate, new_state));
            }
        }

        ino = page_end;
    }
}

fn grow_and_alloc<R, A, G>(pm: &R, alloc: &mut A, gate: &G, state: TableState, blk_type: BlockType, max_height: u8) -> Result<(u64, TableState), PmfsError>
where
    R: PmRegion + ?Sized,
    A: BlockAllocator,
    G: ProtectionGate,
{
    let new_page_blocknr = state.inodes_count / INODES_PER_4K_PAGE as u64;
    let grown_tree = tree::alloc_blocks(pm, alloc, gate, state.tree, BlockType::Block4K, max_height, new_page_blocknr, new_page_blocknr)?;

    let grown_state = TableState {
        tree: grown_tree,
        inodes_count: state.inodes_count + INODES_PER_4K_PAGE as u64,
        ..state
    };

    alloc_inode(pm, alloc, gate, grown_state, blk_type, max_height)
}

/// Frees `ino`'s tree and log (via the supplied closures, since both
/// depend on modules this one does not), marks the slot deleted, and
/// updates the free hint if `ino` precedes it (spec §4.3 "Evict").
pub fn evict_inode<R, G>(pm: &R, gate: &G, state: TableState, ino: u64, dtime: crate::time::UnixTimestamp) -> TableState
where
    R: PmRegion + ?Sized,
    G: ProtectionGate,
{
    if let Some(mut slot) = read_slot(pm, state.tree, ino) {
        slot.links_count = 0;
        slot.dtime = dtime;
        slot.root = 0;
        slot.height = 0;
        write_slot(pm, gate, state.tree, ino, &slot);
    }

    TableState {
        free_hint: state.free_hint.min(ino),
        free_inodes_count: state.free_inodes_count + 1,
        ..state
    }
}

/// Reads the current on-PM slot for `ino`, or `None` if it falls outside
/// the table's allocated extent.
pub fn get_inode<R: PmRegion + ?Sized>(pm: &R, state: TableState, ino: u64) -> Option<RawInode> {
    if ino >= state.inodes_count {
        return None;
    }
    read_slot(pm, state.tree, ino)
}

/// Writes `slot` back to `ino`'s table entry.
pub fn put_inode<R, G>(pm: &R, gate: &G, state: TableState, ino: u64, slot: &RawInode)
where
    R: PmRegion + ?Sized,
    G: ProtectionGate,
{
    write_slot(pm, gate, state.tree, ino, slot);
}

/// `leaf_kind` for the inode-table tree itself: slots address data blocks
/// (inode-sized sub-pages) directly, never log entries.
pub const TABLE_LEAF_KIND: LeafKind = LeafKind::DirBlock;
