//! Radix block tree (C4): per-inode fixed-fanout tree mapping a file block
//! index to a PM block offset (spec §4.1).
//!
//! A node is always one 4 KiB meta block treated as 512 little-endian
//! 64-bit slots ([`SLOTS_PER_NODE`]). The leaf interpretation differs
//! between a file tree (slot names a log entry, which in turn names a
//! data extent) and a directory tree (slot names a data block directly);
//! callers select which with [`LeafKind`], following the spec's suggested
//! "small trait/capability for free a leaf and assign a leaf" (§9).

use alloc::vec::Vec;

use crate::alloc_facade::{BlockAllocator, Hint};
use crate::blocktype::{BlockType, META_BLK_SHIFT};
use crate::error::PmfsError;
use crate::params::SLOTS_PER_NODE;
use crate::pm::{self, PmRegion};
use crate::protect::ProtectionGate;

const NODE_BITS: u32 = 9; // log2(SLOTS_PER_NODE)
const SLOT_MASK: u64 = (SLOTS_PER_NODE as u64) - 1;

/// Whether tree leaves at `height == 1` (or the direct `root` when
/// `height == 0`) are interpreted as log-entry references or as direct
/// data-block offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafKind {
    /// Slot names a log entry; the data block is `entry.block`. Used for
    /// regular file trees (spec §4.1 "Assign range").
    FileEntry,
    /// Slot names a data block directly. Used for directory trees.
    DirBlock,
}

/// Maximum number of file blocks addressable at a given `height`:
/// `2^(height*9)`.
#[must_use]
pub fn max_blocks_at_height(height: u8) -> u64 {
    1u64 << (u32::from(height) * NODE_BITS)
}

/// Minimum height such that `max_blocks_at_height(height) >= num_blocks`
/// (spec §8 "Height minimality").
#[must_use]
pub fn min_height_for(num_blocks: u64) -> u8 {
    let mut height = 0u8;
    while max_blocks_at_height(height) < num_blocks {
        height += 1;
    }
    height
}

fn slot_index(file_blocknr: u64, depth: u8, height: u8) -> usize {
    let shift = u32::from(height - depth) * NODE_BITS;
    ((file_blocknr >> shift) & SLOT_MASK) as usize
}

fn slot_offset(node: u64, idx: usize) -> u64 {
    node + (idx * 8) as u64
}

fn read_slot<R: PmRegion + ?Sized>(pm: &R, node: u64, idx: usize) -> u64 {
    pm::read_u64(pm, slot_offset(node, idx))
}

fn write_slot<R: PmRegion + ?Sized, G: ProtectionGate>(pm: &R, gate: &G, node: u64, idx: usize, value: u64) {
    let off = slot_offset(node, idx);
    gate.unlocked(off, 8, || pm::atomic_store_u64(pm, off, value));
}

/// The `{root, height}` pair as observed before a walk; callers read this
/// once (through [`crate::pm::RootHeightCell`] or equivalent) and pass it
/// down so every recursive step sees a consistent snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeRoot {
    pub root: u64,
    pub height: u8,
}

impl TreeRoot {
    pub const EMPTY: TreeRoot = TreeRoot { root: 0, height: 0 };
}

/// Splits a 4K-relative `file_blocknr` for `blk_type`, returning the file
/// block index proper and the within-data-block byte offset to add back
/// onto the resolved leaf offset (spec §4.1 "Find").
fn split_block_offset(file_blocknr: u64, blk_type: BlockType) -> (u64, u64) {
    let blk_shift = blk_type.blk_shift();
    (file_blocknr >> blk_shift, (file_blocknr & ((1u64 << blk_shift) - 1)) << META_BLK_SHIFT)
}

/// Resolves `file_blocknr` to a PM byte offset, or `0` if the index names
/// a hole (spec §4.1 "Find (`find_data_block`)").
pub fn find_data_block<R: PmRegion + ?Sized>(pm: &R, tree: TreeRoot, blk_type: BlockType, file_blocknr: u64) -> u64 {
    let (index, blk_offset) = split_block_offset(file_blocknr, blk_type);

    if tree.height == 0 {
        if tree.root == 0 {
            return 0;
        }
        return tree.root + blk_offset;
    }

    if index >= max_blocks_at_height(tree.height) {
        return 0;
    }

    let mut node = tree.root;
    for depth in 1..=tree.height {
        if node == 0 {
            return 0;
        }
        let idx = slot_index(index, depth, tree.height);
        let slot = read_slot(pm, node, idx);
        if slot == 0 {
            return 0;
        }
        node = slot;
    }
    node + blk_offset
}

/// Grows the tree (allocating fresh interior nodes, always zeroed per the
/// spec §9 decision to zero-initialize every slot of a fresh node rather
/// than relying on the allocator's `zero` flag alone) until it can address
/// `required_height`. Returns the new `TreeRoot`.
fn grow_to_height<R, A, G>(pm: &R, alloc: &mut A, gate: &G, tree: TreeRoot, required_height: u8) -> Result<TreeRoot, PmfsError>
where
    R: PmRegion + ?Sized,
    A: BlockAllocator,
    G: ProtectionGate,
{
    let mut root = tree.root;
    let mut height = tree.height;

    while height < required_height {
        let mut new_node = [0u64; 1];
        let got = alloc.new_meta_blocks(&mut new_node, 1, true)?;
        if got == 0 {
            return Err(PmfsError::NoSpace);
        }
        let node = new_node[0];
        write_slot(pm, gate, node, 0, root);
        pm::flush_and_fence(pm, node, core::mem::size_of::<u64>() * SLOTS_PER_NODE);
        root = node;
        height += 1;
    }

    Ok(TreeRoot { root, height })
}

/// For the inclusive index range `[first, last]`, fills every empty leaf
/// slot with a freshly allocated data block (spec §4.1 "Allocate range").
/// On partial failure the caller should set `EOFBLOCKS_FL`; this function
/// returns [`PmfsError::NoSpace`] or [`PmfsError::HeightOverflow`] without
/// unwinding blocks it already allocated, matching the source's "allocate
/// what you can" policy.
pub fn alloc_blocks<R, A, G>(
    pm: &R,
    alloc: &mut A,
    gate: &G,
    tree: TreeRoot,
    blk_type: BlockType,
    max_height: u8,
    first: u64,
    last: u64,
) -> Result<TreeRoot, PmfsError>
where
    R: PmRegion + ?Sized,
    A: BlockAllocator,
    G: ProtectionGate,
{
    let required_height = min_height_for(last + 1);
    if required_height > max_height {
        return Err(PmfsError::HeightOverflow);
    }

    if tree.root == 0 && required_height == 0 {
        let mut out = [0u64; 1];
        let got = alloc.new_data_blocks(&mut out, 1, blk_type, true)?;
        if got == 0 {
            return Err(PmfsError::NoSpace);
        }
        return Ok(TreeRoot { root: out[0], height: 0 });
    }

    let grown = grow_to_height(pm, alloc, gate, tree, required_height)?;

    if grown.height == 0 {
        return Ok(grown);
    }

    alloc_range(pm, alloc, gate, grown.root, 1, grown.height, first, last, blk_type)?;
    Ok(grown)
}

#[allow(clippy::too_many_arguments)]
fn alloc_range<R, A, G>(
    pm: &R,
    alloc: &mut A,
    gate: &G,
    node: u64,
    depth: u8,
    height: u8,
    first: u64,
    last: u64,
    blk_type: BlockType,
) -> Result<(), PmfsError>
where
    R: PmRegion + ?Sized,
    A: BlockAllocator,
    G: ProtectionGate,
{
    let shift = u32::from(height - depth) * NODE_BITS;
    let span = 1u64 << shift;
    let lo_idx = ((first >> shift) & SLOT_MASK) as usize;
    let hi_idx = ((last >> shift) & SLOT_MASK) as usize;

    for idx in lo_idx..=hi_idx {
        let slot_first = first.max((idx as u64) * span);
        let slot_last = last.min((idx as u64 + 1) * span - 1);
        let slot = read_slot(pm, node, idx);

        if depth == height {
            if slot == 0 {
                let mut out = [0u64; 1];
                let got = alloc.new_data_blocks(&mut out, 1, blk_type, true)?;
                if got == 0 {
                    return Err(PmfsError::NoSpace);
                }
                write_slot(pm, gate, node, idx, out[0]);
            }
        } else {
            let child = if slot == 0 {
                let mut out = [0u64; 1];
                let got = alloc.new_meta_blocks(&mut out, 1, true)?;
                if got == 0 {
                    return Err(PmfsError::NoSpace);
                }
                write_slot(pm, gate, node, idx, out[0]);
                out[0]
            } else {
                slot
            };
            alloc_range(pm, alloc, gate, child, depth + 1, height, slot_first, slot_last, blk_type)?;
        }
    }

    pm::flush_and_fence(pm, node, core::mem::size_of::<u64>() * SLOTS_PER_NODE);
    Ok(())
}

/// Overwrites the leaf slot for each index in `[first, last]` with
/// `curr_entry` (a log-entry PM offset), freeing whatever the slot
/// previously named and bumping its invalid count via `on_displaced`
/// (spec §4.1 "Assign range").
pub fn assign_blocks<R, A, G>(
    pm: &R,
    alloc: &mut A,
    gate: &G,
    tree: TreeRoot,
    blk_type: BlockType,
    max_height: u8,
    first: u64,
    last: u64,
    curr_entry: u64,
    mut on_displaced: impl FnMut(u64),
) -> Result<TreeRoot, PmfsError>
where
    R: PmRegion + ?Sized,
    A: BlockAllocator,
    G: ProtectionGate,
{
    let required_height = min_height_for(last + 1);
    if required_height > max_height {
        return Err(PmfsError::HeightOverflow);
    }

    let grown = if tree.root == 0 && required_height == 0 {
        TreeRoot { root: curr_entry, height: 0 }
    } else {
        grow_to_height(pm, alloc, gate, tree, required_height)?
    };

    if grown.height == 0 {
        if tree.root != 0 && tree.root != curr_entry {
            on_displaced(tree.root);
        }
        return Ok(TreeRoot { root: curr_entry, height: 0 });
    }

    assign_range(pm, gate, grown.root, 1, grown.height, first, last, curr_entry, &mut on_displaced)?;
    Ok(grown)
}

#[allow(clippy::too_many_arguments)]
fn assign_range<R, G>(
    pm: &R,
    gate: &G,
    node: u64,
    depth: u8,
    height: u8,
    first: u64,
    last: u64,
    curr_entry: u64,
    on_displaced: &mut impl FnMut(u64),
) -> Result<(), PmfsError>
where
    R: PmRegion + ?Sized,
    G: ProtectionGate,
{
    let shift = u32::from(height - depth) * NODE_BITS;
    let span = 1u64 << shift;
    let lo_idx = ((first >> shift) & SLOT_MASK) as usize;
    let hi_idx = ((last >> shift) & SLOT_MASK) as usize;

    for idx in lo_idx..=hi_idx {
        if depth == height {
            let prev = read_slot(pm, node, idx);
            write_slot(pm, gate, node, idx, curr_entry);
            if prev != 0 {
                on_displaced(prev);
            }
        } else {
            let slot_first = first.max((idx as u64) * span);
            let slot_last = last.min((idx as u64 + 1) * span - 1);
            let child = read_slot(pm, node, idx);
            if child == 0 {
                return Err(PmfsError::Corrupt("assign_blocks: missing interior node"));
            }
            assign_range(pm, gate, child, depth + 1, height, slot_first, slot_last, curr_entry, on_displaced)?;
        }
    }

    pm::flush_and_fence(pm, node, core::mem::size_of::<u64>() * SLOTS_PER_NODE);
    Ok(())
}

/// Result of freeing a slice of leaves: whether the node that was walked
/// is now entirely empty (every one of its 512 slots is `0`), in which
/// case the caller frees the node itself.
struct TruncateOutcome {
    node_emptied: bool,
}

/// Recursively frees data (file-tree) or directory blocks in `[first,
/// last]` (spec §4.1 "Truncate range"). `leaf_kind` selects whether a
/// height-1 slot names a log entry (whose data extent is derived and
/// freed, with the entry's invalid count bumped) or a direct data block.
#[allow(clippy::too_many_arguments)]
pub fn truncate_range<R, A, G>(
    pm: &R,
    alloc: &mut A,
    gate: &G,
    tree: TreeRoot,
    blk_type: BlockType,
    leaf_kind: LeafKind,
    first: u64,
    last: u64,
    mut on_leaf_entry: impl FnMut(u64, u64) -> Result<(), PmfsError>,
) -> Result<TreeRoot, PmfsError>
where
    R: PmRegion + ?Sized,
    A: BlockAllocator,
    G: ProtectionGate,
{
    if tree.root == 0 {
        return Ok(tree);
    }

    if tree.height == 0 {
        if leaf_kind == LeafKind::FileEntry {
            on_leaf_entry(0, tree.root)?;
        } else {
            alloc.free_data_block(tree.root, blk_type);
        }
        return Ok(TreeRoot::EMPTY);
    }

    let outcome = truncate_node(pm, alloc, gate, tree.root, 1, tree.height, leaf_kind, blk_type, first, last, &mut on_leaf_entry)?;
    if outcome.node_emptied {
        alloc.free_meta_block(tree.root);
        return Ok(TreeRoot::EMPTY);
    }
    Ok(tree)
}

#[allow(clippy::too_many_arguments)]
fn truncate_node<R, A, G>(
    pm: &R,
    alloc: &mut A,
    gate: &G,
    node: u64,
    depth: u8,
    height: u8,
    leaf_kind: LeafKind,
    blk_type: BlockType,
    first: u64,
    last: u64,
    on_leaf_entry: &mut impl FnMut(u64, u64) -> Result<(), PmfsError>,
) -> Result<TruncateOutcome, PmfsError>
where
    R: PmRegion + ?Sized,
    A: BlockAllocator,
    G: ProtectionGate,
{
    let shift = u32::from(height - depth) * NODE_BITS;
    let span = 1u64 << shift;
    let lo_idx = ((first >> shift) & SLOT_MASK) as usize;
    let hi_idx = ((last >> shift) & SLOT_MASK) as usize;

    for idx in lo_idx..=hi_idx {
        let slot_first = first.max((idx as u64) * span);
        let slot_last = last.min((idx as u64 + 1) * span - 1);
        let slot = read_slot(pm, node, idx);
        if slot == 0 {
            continue;
        }

        if depth == height {
            if leaf_kind == LeafKind::FileEntry {
                on_leaf_entry(slot_first, slot)?;
            } else {
                alloc.free_data_block(slot, blk_type);
            }
            write_slot(pm, gate, node, idx, 0);
        } else {
            let child_outcome = truncate_node(pm, alloc, gate, slot, depth + 1, height, leaf_kind, blk_type, slot_first, slot_last, on_leaf_entry)?;
            if child_outcome.node_emptied {
                alloc.free_meta_block(slot);
                write_slot(pm, gate, node, idx, 0);
            }
        }
    }

    let emptied = (0..SLOTS_PER_NODE).all(|idx| read_slot(pm, node, idx) == 0);
    if emptied {
        pm::flush_and_fence(pm, node, core::mem::size_of::<u64>() * SLOTS_PER_NODE);
    } else {
        pm::flush_and_fence(pm, slot_offset(node, lo_idx), (hi_idx - lo_idx + 1) * 8);
    }

    Ok(TruncateOutcome { node_emptied: emptied })
}

/// Replaces the root with its slot-0 child while `height` exceeds the
/// minimum needed for `new_size_blocks`, freeing each discarded root (spec
/// §4.1 "Height shrink"). The `{root, height}` update for each step must
/// be published atomically by the caller (e.g. via
/// [`crate::pm::RootHeightCell::compare_and_swap`]); this function only
/// computes the sequence of intermediate states.
pub fn decrease_btree_height<R, A>(pm: &R, alloc: &mut A, tree: TreeRoot, new_size_blocks: u64) -> TreeRoot
where
    R: PmRegion + ?Sized,
    A: BlockAllocator,
{
    let target = min_height_for(new_size_blocks);
    let mut current = tree;

    while current.height > target && current.height > 0 {
        let child = read_slot(pm, current.root, 0);
        alloc.free_meta_block(current.root);
        current = TreeRoot { root: child, height: current.height - 1 };
    }

    current
}

/// Outcome of a `SEEK_DATA`/`SEEK_HOLE` scan (spec §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekOutcome {
    /// Resolved to `offset` file-block index.
    Found(u64),
    /// The starting position was already past EOF.
    PastEof,
}

/// Recursive walk accumulating whether data or holes were seen, matching
/// `SEEK_DATA`/`SEEK_HOLE` tie-break rules: data presence wins over hole
/// presence within the same slot, and a `SEEK_DATA` scan stops as soon as
/// data is found.
pub fn seek(pm: &impl PmRegion, tree: TreeRoot, blk_type: BlockType, start: u64, size_blocks: u64, want_data: bool) -> SeekOutcome {
    if start >= size_blocks {
        return SeekOutcome::PastEof;
    }

    if tree.height == 0 {
        let has_data = tree.root != 0;
        return if has_data == want_data {
            SeekOutcome::Found(start)
        } else if want_data {
            SeekOutcome::PastEof
        } else {
            SeekOutcome::Found(size_blocks)
        };
    }

    let mut collected: Vec<(u64, bool)> = Vec::new();
    walk_seek(pm, tree.root, 1, tree.height, start, size_blocks.min(max_blocks_at_height(tree.height)) - 1, &mut collected, want_data);
    let _ = blk_type;

    for &(idx, has_data) in &collected {
        if has_data == want_data {
            return SeekOutcome::Found(idx);
        }
    }

    if want_data {
        SeekOutcome::PastEof
    } else {
        SeekOutcome::Found(size_blocks)
    }
}

fn walk_seek<R: PmRegion + ?Sized>(
    pm: &R,
    node: u64,
    depth: u8,
    height: u8,
    first: u64,
    last: u64,
    out: &mut Vec<(u64, bool)>,
    want_data: bool,
) {
    let shift = u32::from(height - depth) * NODE_BITS;
    let span = 1u64 << shift;
    let lo_idx = ((first >> shift) & SLOT_MASK) as usize;
    let hi_idx = ((last >> shift) & SLOT_MASK) as usize;

    for idx in lo_idx..=hi_idx {
        let slot_first = first.max((idx as u64) * span);
        let slot = read_slot(pm, node, idx);
        let has_data = slot != 0;

        if depth == height {
            out.push((slot_first, has_data));
        } else if has_data {
            let slot_last = last.min((idx as u64 + 1) * span - 1);
            walk_seek(pm, slot, depth + 1, height, slot_first, slot_last, out, want_data);
        } else {
            out.push((slot_first, false));
        }

        if want_data && out.last().map(|&(_, d)| d).unwrap_or(false) {
            return;
        }
    }
}
