//! Tunables collected into one struct instead of scattered constants,
//! mirroring how the teacher groups related magic numbers (see e.g.
//! `Ext4Superblock`'s block-size/group-size fields).

/// Number of 64-bit slots in a radix node / inode-table page boundary; fixed
/// by the on-PM format (`META_BLK_SHIFT = 9` means 2^9 slots).
pub const SLOTS_PER_NODE: usize = 512;

/// Maximum supported radix-tree height. A file tree taller than this cannot
/// be grown further; `alloc_blocks` fails with `HeightOverflow`.
pub const MAX_HEIGHT: u8 = 3;

/// Base PM block / meta block size (4 KiB), used for radix nodes, log pages
/// and the unit the allocator hands out meta blocks in.
pub const META_BLOCK_SIZE: usize = 4096;

/// Number of fixed 32-byte entries that fit on one log page
/// (4096 - 32-byte tail) / 32-byte entry = 127.
pub const ENTRIES_PER_LOG_PAGE: usize = 127;

/// Size in bytes of one log entry.
pub const LOG_ENTRY_SIZE: usize = 32;

/// Size in bytes of the tail record appended after the fixed entries on a
/// log page; its last 8 bytes hold the `next_page` PM offset.
pub const LOG_TAIL_SIZE: usize = 32;

/// Byte offset within a page past which an entry cannot be started without
/// crossing into the tail record.
pub const LAST_ENTRY: usize = ENTRIES_PER_LOG_PAGE * LOG_ENTRY_SIZE;

/// Fixed size in bytes of one on-PM inode slot.
pub const INODE_SIZE: usize = 128;

/// Number of inode slots that fit in one 4 KiB inode-table page.
pub const INODES_PER_4K_PAGE: usize = META_BLOCK_SIZE / INODE_SIZE;

/// Saturation ceiling for a log entry's `invalid_pages` counter.
pub const MAX_INVALID_COUNT: u16 = 4000;

/// Maximum number of log pages a single append-time grow is allowed to
/// allocate at once, per "grow by allocating up to 256 pages" in the spec.
pub const MAX_LOG_GROWTH_PAGES: usize = 256;

/// Fixed overhead of a directory entry record ahead of its variable-length
/// name (spec §6: "Directory entry record length = `((name_len + 28 + 3) &
/// ~3)` bytes").
pub const DIRENT_HEADER_SIZE: usize = 28;

/// Total on-PM size of a directory entry record for a name of `name_len`
/// bytes, rounded up to a 4-byte boundary (spec §6).
#[must_use]
pub const fn dirent_record_len(name_len: u8) -> usize {
    (name_len as usize + DIRENT_HEADER_SIZE + 3) & !3
}

/// Runtime-overridable tunables for a mounted filesystem instance.
///
/// All fields default to the on-PM format's fixed constants above; an
/// embedding filesystem may override `max_log_growth_pages` to throttle how
/// aggressively a single append grows the log chain.
#[derive(Clone, Copy, Debug)]
pub struct Params {
    pub max_height: u8,
    pub max_invalid_count: u16,
    pub max_log_growth_pages: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_height: MAX_HEIGHT,
            max_invalid_count: MAX_INVALID_COUNT,
            max_log_growth_pages: MAX_LOG_GROWTH_PAGES,
        }
    }
}
