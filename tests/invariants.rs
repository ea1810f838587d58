//! Property tests for the structural invariants listed in spec §8.

mod support;

use proptest::prelude::*;

use pmfs_core::blocktype::BlockType;
use pmfs_core::lifecycle::Engine;
use pmfs_core::log::{self, LogEntry, LogState};
use pmfs_core::params::META_BLOCK_SIZE;
use pmfs_core::pmsim::PmSim;
use pmfs_core::protect::NoopGate;
use pmfs_core::time::{FixedClock, UnixTimestamp};
use pmfs_core::tree::{self, TreeRoot};

use support::{TestAllocator, TestJournal};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Round-trip: every index allocated via `alloc_blocks` resolves back
    /// to a non-zero PM offset through `find_data_block`, and indices never
    /// touched stay holes.
    #[test]
    fn alloc_round_trips_for_arbitrary_index_sets(
        indices in proptest::collection::hash_set(0u64..4000, 1..12)
    ) {
        let pm = PmSim::new(META_BLOCK_SIZE * 1024);
        let mut alloc = TestAllocator::new(0);
        let gate = NoopGate;

        let mut tree = TreeRoot::EMPTY;
        for &i in &indices {
            tree = tree::alloc_blocks(&pm, &mut alloc, &gate, tree, BlockType::Block4K, 3, i, i).unwrap();
        }

        for &i in &indices {
            prop_assert_ne!(tree::find_data_block(&pm, tree, BlockType::Block4K, i), 0);
        }

        for probe in 0u64..20 {
            if !indices.contains(&probe) {
                prop_assert_eq!(tree::find_data_block(&pm, tree, BlockType::Block4K, probe), 0);
            }
        }
    }

    /// Height minimality: after allocating up to `max_index`, the tree's
    /// height is exactly the minimum height that can address it.
    #[test]
    fn height_is_minimal_for_the_highest_allocated_index(max_index in 0u64..4000) {
        let pm = PmSim::new(META_BLOCK_SIZE * 1024);
        let mut alloc = TestAllocator::new(0);
        let gate = NoopGate;

        let tree = tree::alloc_blocks(&pm, &mut alloc, &gate, TreeRoot::EMPTY, BlockType::Block4K, 3, max_index, max_index).unwrap();
        prop_assert_eq!(tree.height, tree::min_height_for(max_index + 1));
    }

    /// Idempotence: truncating an already-empty tree to 0 is a no-op.
    #[test]
    fn truncating_empty_tree_twice_stays_empty(_seed in 0u64..10) {
        let pm = PmSim::new(META_BLOCK_SIZE * 8);
        let mut alloc = TestAllocator::new(0);
        let gate = NoopGate;

        let once = tree::truncate_range(&pm, &mut alloc, &gate, TreeRoot::EMPTY, BlockType::Block4K, tree::LeafKind::DirBlock, 0, 0, |_, _| Ok(())).unwrap();
        let twice = tree::truncate_range(&pm, &mut alloc, &gate, once, BlockType::Block4K, tree::LeafKind::DirBlock, 0, 0, |_, _| Ok(())).unwrap();
        prop_assert_eq!(twice, TreeRoot::EMPTY);
        prop_assert_eq!(twice.root, 0);
        prop_assert_eq!(twice.height, 0);
    }

    /// Assign frees predecessor: `Engine::write` overwriting an
    /// already-written block frees the old data block and bumps the old
    /// entry's invalid count by one, for any 4K-aligned offset.
    #[test]
    fn rewrite_frees_predecessor_and_bumps_invalid_count(block_index in 0u64..64) {
        let offset = block_index * 4096;

        let mut engine = Engine {
            pm: PmSim::new(META_BLOCK_SIZE * 64),
            alloc: TestAllocator::new(0),
            gate: NoopGate,
            journal: TestJournal::default(),
            clock: FixedClock(UnixTimestamp::ZERO),
            table: pmfs_core::table::TableState { tree: TreeRoot::EMPTY, free_hint: 1, free_inodes_count: 0, inodes_count: 0 },
            truncate_head: 0,
            max_height: 3,
        };

        let (tree, log_state) = engine.write(TreeRoot::EMPTY, LogState::EMPTY, offset, &[1u8; 4096]).unwrap();
        let first_entry_offset = tree::find_data_block(&engine.pm, tree, BlockType::Block4K, block_index);
        prop_assert_ne!(first_entry_offset, 0);
        let first_data_block = log::read_entry_at(&engine.pm, first_entry_offset).block;

        let freed_before = engine.alloc.freed.len();
        let (tree2, _log_state2) = engine.write(tree, log_state, offset, &[2u8; 4096]).unwrap();

        prop_assert!(engine.alloc.freed.contains(&first_data_block));
        prop_assert_eq!(engine.alloc.freed.len(), freed_before + 1);

        let second_entry_offset = tree::find_data_block(&engine.pm, tree2, BlockType::Block4K, block_index);
        prop_assert_ne!(second_entry_offset, first_entry_offset);
        let second_data_block = log::read_entry_at(&engine.pm, second_entry_offset).block;
        prop_assert_ne!(second_data_block, first_data_block);
    }

    /// Tree-to-entry consistency: a `FILE_WRITE` entry's `pgoff`/`num_pages`
    /// range always contains the index it is assigned under.
    #[test]
    fn entry_extent_always_covers_its_own_assigned_index(index in 0u64..u32::MAX as u64, span in 1u16..64) {
        let entry = LogEntry::file_write(0x1000, index as u32, span, UnixTimestamp::ZERO);
        prop_assert!(entry.covers(index));
        prop_assert!(!entry.covers(index + u64::from(span)));
    }
}
