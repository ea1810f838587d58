//! Integration tests for inode lifecycle orchestration (C9), exercising
//! create/write/setsize/evict end to end against the full module stack.

mod support;

use pmfs_core::blocktype::BlockType;
use pmfs_core::dirindex::DirectoryIndex;
use pmfs_core::lifecycle::Engine;
use pmfs_core::log;
use pmfs_core::pm::PmRegion;
use pmfs_core::pmsim::PmSim;
use pmfs_core::protect::NoopGate;
use pmfs_core::table::{self, TableState};
use pmfs_core::time::FixedClock;
use pmfs_core::time::UnixTimestamp;
use pmfs_core::tree::{self, LeafKind, TreeRoot};

use support::{TestAllocator, TestJournal};

fn engine() -> Engine<PmSim, TestAllocator, NoopGate, TestJournal, FixedClock> {
    Engine {
        pm: PmSim::new(4096 * 256),
        alloc: TestAllocator::new(0),
        gate: NoopGate,
        journal: TestJournal::default(),
        clock: FixedClock(UnixTimestamp(42)),
        table: TableState { tree: TreeRoot::EMPTY, free_hint: 1, free_inodes_count: 0, inodes_count: 0 },
        truncate_head: 0,
        max_height: 3,
    }
}

#[test]
fn create_write_read_back_round_trip() {
    let mut engine = engine();
    let mut parent = DirectoryIndex::new();

    let (ino, _parent_log) = engine.create(&mut parent, pmfs_core::log::LogState::EMPTY, b"file.txt", 0o100644, BlockType::Block4K).unwrap();
    assert_eq!(parent.lookup(b"file.txt").unwrap().ino, ino as u32);

    let payload = [b'Z'; 4096];
    let (tree_state, log_state) = engine.write(TreeRoot::EMPTY, pmfs_core::log::LogState::EMPTY, 0, &payload).unwrap();

    let entry_off = tree::find_data_block(&engine.pm, tree_state, BlockType::Block4K, 0);
    assert_ne!(entry_off, 0);
    let data_off = log::read_entry_at(&engine.pm, entry_off).block;
    assert_eq!(engine.pm.slice(data_off, 4096), &payload[..]);
    assert_eq!(log_state.pages, 1);
}

#[test]
fn overwrite_same_block_frees_the_displaced_entry() {
    let mut engine = engine();
    let first_payload = [1u8; 4096];
    let (tree_state, log_state) = engine.write(TreeRoot::EMPTY, pmfs_core::log::LogState::EMPTY, 0, &first_payload).unwrap();

    let freed_before = engine.alloc.freed.len();
    let second_payload = [2u8; 4096];
    let (tree_state2, _log_state2) = engine.write(tree_state, log_state, 0, &second_payload).unwrap();

    assert!(engine.alloc.freed.len() > freed_before, "overwriting a block should free the old data block");
    let entry_off = tree::find_data_block(&engine.pm, tree_state2, BlockType::Block4K, 0);
    let data_off = log::read_entry_at(&engine.pm, entry_off).block;
    assert_eq!(engine.pm.slice(data_off, 4096), &second_payload[..]);
}

#[test]
fn truncate_to_zero_reclaims_block_zero_and_empties_the_tree() {
    let mut engine = engine();
    let (tree_state, _log_state) = engine.write(TreeRoot::EMPTY, pmfs_core::log::LogState::EMPTY, 0, &[9u8; 4096]).unwrap();
    assert_ne!(tree::find_data_block(&engine.pm, tree_state, BlockType::Block4K, 0), 0);

    let mut slot = pmfs_core::inode::RawInode::fresh(BlockType::Block4K);
    slot.mode = 0o100644;
    slot.size = 4096;

    let freed_before = engine.alloc.freed.len();
    let shrunk = engine.setsize(1, &mut slot, tree_state, LeafKind::FileEntry, 0).unwrap();

    assert_eq!(shrunk, TreeRoot::EMPTY);
    assert_eq!(slot.size, 0);
    assert!(engine.alloc.freed.len() > freed_before, "block 0 should have been freed");
    assert_eq!(tree::find_data_block(&engine.pm, shrunk, BlockType::Block4K, 0), 0);
}

#[test]
fn evict_frees_blocks_and_marks_table_slot_free() {
    let mut engine = engine();
    let mut parent = DirectoryIndex::new();
    let (ino, _parent_log) = engine.create(&mut parent, pmfs_core::log::LogState::EMPTY, b"doomed", 0o100644, BlockType::Block4K).unwrap();

    let (tree_state, _log_state) = engine.write(TreeRoot::EMPTY, pmfs_core::log::LogState::EMPTY, 0, &[7u8; 4096]).unwrap();

    let mut slot = table::get_inode(&engine.pm, engine.table, ino).unwrap();
    slot.size = 4096;

    engine.evict(ino, slot, tree_state, LeafKind::FileEntry).unwrap();

    let slot_after = table::get_inode(&engine.pm, engine.table, ino).unwrap();
    assert!(slot_after.is_free());
}
