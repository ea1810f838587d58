//! On-PM inode record (spec §3/§6): a fixed 128-byte slot addressed by
//! `ino * INODE_SIZE` inside the inode table's file extent.
//!
//! Mirrors the teacher's `Ext4Inode`-family layout convention (newtype
//! wrappers over the raw integer fields, one `#[repr(C)]` `Pod`/`Zeroable`
//! struct with every field public to its owning module) rather than
//! bitfields, since every field here is byte- or word-sized and none are
//! sub-byte flags.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

use crate::blocktype::BlockType;
use crate::params::INODE_SIZE;
use crate::time::UnixTimestamp;

/// Set on an inode whose allocated extent exceeds `i_size`; tells recovery
/// to run a full-range truncate rather than trust `i_size` alone (spec
/// §4.1 "Allocate range", step 4).
pub const EOFBLOCKS_FL: u32 = 0x0001;

/// POSIX file-type mask and the three type bits this crate's callers are
/// expected to ever see on-PM. `setsize` refuses to guess at a size change
/// for any other bit pattern rather than silently treating it as a regular
/// file (spec §9 open question on undefined `i_mode` format bits).
pub const S_IFMT: u16 = 0o170000;
pub const S_IFREG: u16 = 0o100000;
pub const S_IFDIR: u16 = 0o040000;
pub const S_IFLNK: u16 = 0o120000;

/// The raw, on-PM inode record. 128 bytes, no padding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct RawInode {
    pub mode: u16,
    pub blk_type: BlockType,
    pub height: u8,
    pub links_count: u16,
    _reserved0: u16,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub blocks: u64,
    pub atime: UnixTimestamp,
    pub ctime: UnixTimestamp,
    pub mtime: UnixTimestamp,
    pub dtime: UnixTimestamp,
    pub generation: u32,
    pub flags: u32,
    /// PM offset of the root radix node (`height > 0`) or the single
    /// direct leaf reference (`height == 0`); `0` means an empty tree.
    pub root: u64,
    pub log_head: u64,
    pub log_tail: u64,
    pub log_pages: u32,
    pub dev: u32,
    pub xattr: u64,
    /// `truncate_item.next`: next inode number on the truncate list, or 0.
    pub truncate_next: u64,
    /// `truncate_item.truncate_size`: target size recorded when this inode
    /// was linked onto the truncate list.
    pub truncate_size: u64,
}

const_assert_eq!(core::mem::size_of::<RawInode>(), INODE_SIZE);

impl RawInode {
    /// A fresh slot as carved from the inode table: empty tree, empty log,
    /// not on the truncate list. Matches spec §3 "Lifecycle": "its log and
    /// tree are empty (`log_head=log_tail=0, root=0, height=0`)".
    #[must_use]
    pub fn fresh(blk_type: BlockType) -> Self {
        Self {
            blk_type,
            ..Self::zeroed()
        }
    }

    /// An inode slot is free iff it has no hard links and either was never
    /// assigned a mode or has been marked deleted (spec §3 "Inode table").
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.links_count == 0 && (self.mode == 0 || !self.dtime.is_zero())
    }

    #[must_use]
    pub fn has_eofblocks_flag(&self) -> bool {
        self.flags & EOFBLOCKS_FL != 0
    }

    pub fn set_eofblocks_flag(&mut self) {
        self.flags |= EOFBLOCKS_FL;
    }

    pub fn clear_eofblocks_flag(&mut self) {
        self.flags &= !EOFBLOCKS_FL;
    }

    #[must_use]
    pub fn on_truncate_list(&self) -> bool {
        self.truncate_next != 0 || self.truncate_size != 0
    }

    /// Whether `mode`'s file-type bits are one this crate recognizes.
    #[must_use]
    pub fn has_known_file_type(&self) -> bool {
        matches!(self.mode & S_IFMT, S_IFREG | S_IFDIR | S_IFLNK)
    }
}
