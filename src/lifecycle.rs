//! Inode lifecycle (C9): create/write/setattr/evict orchestration
//! combining the radix tree (C4), inode log (C5), inode table (C6),
//! truncate list (C7) and directory index (C8) with the allocator,
//! protection gate and journal (spec §4.6).

use crate::alloc_facade::BlockAllocator;
use crate::blocktype::BlockType;
use crate::dirent;
use crate::dirindex::{DirectoryIndex, InsertOutcome};
use crate::error::PmfsError;
use crate::inode::{RawInode, S_IFDIR};
use crate::journal::{Journal, LogEntryKind};
use crate::log::{self, LogEntry, LogState};
use crate::params::MAX_LOG_GROWTH_PAGES;
use crate::protect::ProtectionGate;
use crate::table::{self, TableState};
use crate::time::Clock;
use crate::tree::{self, LeafKind, TreeRoot};
use crate::truncate_list;

/// Everything C9 needs in one place, mirroring how the teacher's `Ext4Fs`
/// bundles a superblock, group descriptors and a drive handle behind one
/// `mount()`-returned struct rather than threading each piece separately
/// through every call.
pub struct Engine<R, A, G, J, C> {
    pub pm: R,
    pub alloc: A,
    pub gate: G,
    pub journal: J,
    pub clock: C,
    pub table: TableState,
    pub truncate_head: u64,
    pub max_height: u8,
}

impl<R, A, G, J, C> Engine<R, A, G, J, C>
where
    R: crate::pm::PmRegion,
    A: BlockAllocator,
    G: ProtectionGate,
    J: Journal,
    C: Clock,
{
    /// Creates a new inode as a directory entry of `parent_log` (spec §4.6
    /// "Create"), writing the on-PM `DIR_LOG` entry and its directory entry
    /// record (spec §6) and indexing it into `parent_index` (C5 + C8), all
    /// inside one journal transaction. On commit failure the freshly carved
    /// slot is left marked bad by the caller (returned as `Err`) rather
    /// than silently reused.
    pub fn create(
        &mut self,
        parent_index: &mut DirectoryIndex,
        parent_log: LogState,
        name: &[u8],
        mode: u16,
        blk_type: BlockType,
    ) -> Result<(u64, LogState), PmfsError> {
        let mut txn = self.journal.new_transaction(3)?;

        let (ino, new_table) = table::alloc_inode(&self.pm, &mut self.alloc, &self.gate, self.table, blk_type, self.max_height)?;
        self.table = new_table;

        let mut slot = table::get_inode(&self.pm, self.table, ino).ok_or(PmfsError::BadInode)?;
        slot.mode = mode;
        slot.links_count = 1;
        let now = self.clock.now();
        slot.atime = now;
        slot.ctime = now;
        slot.mtime = now;

        self.journal
            .add_logentry(&mut txn, ino * u64::from(crate::params::INODE_SIZE as u32), crate::params::INODE_SIZE, LogEntryKind::Inode);
        table::put_inode(&self.pm, &self.gate, self.table, ino, &slot);

        let mut record_slot = alloc::vec![0u64; 1];
        let got = self.alloc.new_meta_blocks(&mut record_slot, 1, true)?;
        if got == 0 {
            return Err(PmfsError::NoSpace);
        }
        let record_offset = record_slot[0];
        let is_dir = mode & crate::inode::S_IFMT == S_IFDIR;
        dirent::write(&self.pm, &self.gate, record_offset, ino, mode, is_dir, slot.links_count, name, now);
        dirent::write_inlined_inode(&self.pm, &self.gate, record_offset, name.len() as u8, &slot);
        self.journal.add_logentry(&mut txn, record_offset, crate::params::dirent_record_len(name.len() as u8), LogEntryKind::DirEntry);

        let dir_entry = LogEntry::dir_log(ino as u32, record_offset, name.len() as u8, true, now);
        let (page, idx, next_state) = log::reserve_append(&self.pm, &mut self.alloc, &self.gate, parent_log, MAX_LOG_GROWTH_PAGES)?;
        log::append_entry(&self.pm, &self.gate, page, idx, &dir_entry);
        let new_log_state = log::publish_tail(&self.pm, &self.gate, next_state, page, idx);

        match parent_index.insert(name, ino as u32, record_offset) {
            InsertOutcome::Inserted => {}
            InsertOutcome::HashCollision => {
                return Err(PmfsError::Corrupt("directory entry name collides with an existing hash bucket"));
            }
        }

        self.journal.commit(txn)?;
        Ok((ino, new_log_state))
    }

    /// Writes `payload` at file-relative byte `offset` (spec §4.6
    /// "Write"): allocate fresh data blocks, append a `FILE_WRITE` entry,
    /// then [`tree::assign_blocks`] publishes it into the tree, freeing
    /// whatever the displaced leaf named and bumping its invalid count.
    pub fn write(&mut self, tree_state: TreeRoot, mut log_state: LogState, offset: u64, payload: &[u8]) -> Result<(TreeRoot, LogState), PmfsError> {
        let data_bits = 12u32;
        let first_block = offset >> data_bits;
        let num_pages = (payload.len() as u64).div_ceil(1u64 << data_bits).max(1);
        let last_block = first_block + num_pages - 1;

        let mut out = alloc::vec![0u64; 1];
        let got = self.alloc.new_data_blocks(&mut out, 1, BlockType::Block4K, false)?;
        if got == 0 {
            return Err(PmfsError::NoSpace);
        }
        let data_block = out[0];

        self.gate.unlocked(data_block, payload.len(), || {
            self.pm.slice_mut(data_block, payload.len()).copy_from_slice(payload);
        });
        crate::pm::flush_and_fence(&self.pm, data_block, payload.len());

        let entry = LogEntry::file_write(data_block, first_block as u32, num_pages as u16, self.clock.now());
        let max_growth = 256usize;
        let (page, idx, next_state) = log::reserve_append(&self.pm, &mut self.alloc, &self.gate, log_state, max_growth)?;
        log::append_entry(&self.pm, &self.gate, page, idx, &entry);
        log_state = log::publish_tail(&self.pm, &self.gate, next_state, page, idx);

        let entry_offset = page + (idx * crate::params::LOG_ENTRY_SIZE) as u64;
        let mut displaced = None;
        let new_tree = tree::assign_blocks(
            &self.pm,
            &mut self.alloc,
            &self.gate,
            tree_state,
            BlockType::Block4K,
            self.max_height,
            first_block,
            last_block,
            entry_offset,
            |old| displaced = Some(old),
        )?;

        if let Some(old_entry_offset) = displaced {
            let old_entry = log::read_entry_at(&self.pm, old_entry_offset);
            log::bump_invalid_at(&self.pm, &self.gate, old_entry_offset);
            self.alloc.free_data_block(old_entry.block, BlockType::Block4K);
        }

        Ok((new_tree, log_state))
    }

    /// `setattr` for size changes (spec §4.6 "Setattr", `ATTR_SIZE` path):
    /// link onto the truncate list, truncate the tree down to `new_size`,
    /// then unlink. Non-size attribute updates are a single in-place field
    /// write by the caller and do not go through this path.
    pub fn setsize(&mut self, ino: u64, slot: &mut RawInode, tree_state: TreeRoot, leaf_kind: LeafKind, new_size: u64) -> Result<TreeRoot, PmfsError> {
        if !slot.has_known_file_type() {
            return Err(PmfsError::BadInode);
        }

        self.truncate_head = truncate_list::truncate_add(self.truncate_head, ino, slot, new_size, false);

        let new_size_blocks = new_size.div_ceil(crate::params::META_BLOCK_SIZE as u64);
        let old_blocks = slot.size.div_ceil(crate::params::META_BLOCK_SIZE as u64);

        let shrunk = if new_size_blocks < old_blocks {
            let mut freed_leaves = alloc::vec::Vec::new();
            let freed_tree = tree::truncate_range(
                &self.pm,
                &mut self.alloc,
                &self.gate,
                tree_state,
                slot.blk_type,
                leaf_kind,
                new_size_blocks,
                old_blocks.saturating_sub(1),
                |_pgoff, leaf| {
                    freed_leaves.push(leaf);
                    Ok(())
                },
            )?;
            self.reclaim_leaves(&freed_leaves, leaf_kind, slot.blk_type);
            if new_size == 0 {
                TreeRoot::EMPTY
            } else {
                tree::decrease_btree_height(&self.pm, &mut self.alloc, freed_tree, new_size_blocks)
            }
        } else {
            tree_state
        };

        slot.size = new_size;

        // `truncate_add` above put `ino` at the list head, and the caller
        // holds the truncate-list lock for the whole of this call (spec
        // §5 `s_truncate_lock`), so no other entry can have been linked in
        // front of it in between: removal is always the head case.
        debug_assert_eq!(self.truncate_head, ino);
        self.truncate_head = slot.truncate_next;
        slot.truncate_next = 0;
        slot.truncate_size = 0;

        Ok(shrunk)
    }

    /// Frees an unlinked inode's tree and log, marks the slot deleted, and
    /// reclaims it in the table (spec §4.6 "Evict").
    pub fn evict(&mut self, ino: u64, slot: RawInode, tree_state: TreeRoot, leaf_kind: LeafKind) -> Result<(), PmfsError> {
        let last_block = if slot.has_eofblocks_flag() {
            tree::max_blocks_at_height(slot.height).saturating_sub(1)
        } else {
            slot.size.div_ceil(crate::params::META_BLOCK_SIZE as u64).saturating_sub(1)
        };

        let mut freed_leaves = alloc::vec::Vec::new();
        tree::truncate_range(&self.pm, &mut self.alloc, &self.gate, tree_state, slot.blk_type, leaf_kind, 0, last_block, |_pgoff, leaf| {
            freed_leaves.push(leaf);
            Ok(())
        })?;
        self.reclaim_leaves(&freed_leaves, leaf_kind, slot.blk_type);

        let _ = log::free_log(&self.pm, &mut self.alloc, LogState { head: slot.log_head, tail: slot.log_tail, pages: slot.log_pages });

        let now = self.clock.now();
        self.table = table::evict_inode(&self.pm, &self.gate, self.table, ino, now);
        Ok(())
    }

    /// For `FileEntry`-kind leaves, `leaves` are log-entry PM offsets: bump
    /// each entry's invalid count and free the data block it named. For
    /// `DirBlock`-kind leaves the data blocks were already freed directly
    /// by [`tree::truncate_range`], so there is nothing left to reclaim.
    fn reclaim_leaves(&mut self, leaves: &[u64], leaf_kind: LeafKind, blk_type: BlockType) {
        if leaf_kind != LeafKind::FileEntry {
            return;
        }
        for &entry_offset in leaves {
            let old_entry = log::read_entry_at(&self.pm, entry_offset);
            log::bump_invalid_at(&self.pm, &self.gate, entry_offset);
            self.alloc.free_data_block(old_entry.block, blk_type);
        }
    }
}
