//! Directory entry records (spec §6): the variable-length, name-bearing
//! record a `DIR_LOG` log entry's `block` field points at.
//!
//! A `LogEntry` is always a fixed 32 bytes (spec §3), too small to hold a
//! name, so the name and the rest of the per-link metadata live in a
//! separate record inlined into the log page's free space right after the
//! entry that introduces it, the same way a `new_inode`-flagged entry has
//! the new inode's raw slot inlined after it (spec §4.5 "Rebuild from
//! log"). [`DIRENT_HEADER_SIZE`] fixed bytes are followed by `name_len`
//! bytes of name, padded to a 4-byte boundary per spec §6's formula.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

use crate::inode::RawInode;
use crate::params::{DIRENT_HEADER_SIZE, INODE_SIZE};
use crate::pm::{self, PmRegion};
use crate::protect::ProtectionGate;
use crate::time::UnixTimestamp;

const CACHELINE: u64 = 64;

fn align_cacheline(offset: u64) -> u64 {
    (offset + CACHELINE - 1) & !(CACHELINE - 1)
}

/// Offset, relative to a record starting at `record_offset`, where a
/// `new_inode`-flagged entry's inlined raw inode copy lives: cacheline-
/// aligned immediately after the header and name (spec §4.5 "`new_inode==1`
/// entries are followed by an inlined `PMFS_INODE_SIZE` slot that must be
/// cacheline-aligned after the log entry").
#[must_use]
pub fn inline_inode_offset(record_offset: u64, name_len: u8) -> u64 {
    align_cacheline(record_offset + DIRENT_HEADER_SIZE as u64 + u64::from(name_len))
}

/// Writes the raw inode slot inlined at [`inline_inode_offset`] for a
/// `new_inode`-flagged `DIR_LOG` entry.
pub fn write_inlined_inode<R, G>(pm: &R, gate: &G, record_offset: u64, name_len: u8, inode: &RawInode)
where
    R: PmRegion + ?Sized,
    G: ProtectionGate,
{
    let off = inline_inode_offset(record_offset, name_len);
    gate.unlocked(off, INODE_SIZE, || {
        pm.slice_mut(off, INODE_SIZE).copy_from_slice(bytemuck::bytes_of(inode));
    });
    pm::flush_and_fence(pm, off, INODE_SIZE);
}

/// Reads back the inode slot written by [`write_inlined_inode`].
#[must_use]
pub fn read_inlined_inode<R: PmRegion + ?Sized>(pm: &R, record_offset: u64, name_len: u8) -> RawInode {
    let off = inline_inode_offset(record_offset, name_len);
    *bytemuck::from_bytes(pm.slice(off, INODE_SIZE))
}

/// Fixed portion of a directory entry record, immediately followed by
/// `name_len` bytes of name (not part of this struct, since it is
/// variable-length).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C, packed)]
pub struct DirEntryHeader {
    pub ino: u64,
    pub mtime: UnixTimestamp,
    pub links_count: u16,
    pub is_dir: u8,
    pub name_len: u8,
    pub mode: u16,
    _reserved: [u8; 6],
}

const_assert_eq!(core::mem::size_of::<DirEntryHeader>(), DIRENT_HEADER_SIZE);

/// Writes a directory entry record at `offset`: the fixed header followed
/// by `name`. The caller reserved `dirent_record_len(name.len())` bytes at
/// `offset`, which may exceed `size_of::<DirEntryHeader>() + name.len()` by
/// up to three padding bytes; those are left untouched (the page was
/// zeroed at allocation).
pub fn write<R, G>(pm: &R, gate: &G, offset: u64, ino: u64, mode: u16, is_dir: bool, links_count: u16, name: &[u8], mtime: UnixTimestamp)
where
    R: PmRegion + ?Sized,
    G: ProtectionGate,
{
    let header = DirEntryHeader {
        ino,
        mtime,
        links_count,
        is_dir: u8::from(is_dir),
        name_len: name.len() as u8,
        mode,
        _reserved: [0; 6],
    };
    let total = DIRENT_HEADER_SIZE + name.len();
    gate.unlocked(offset, total, || {
        pm.slice_mut(offset, DIRENT_HEADER_SIZE).copy_from_slice(bytemuck::bytes_of(&header));
        pm.slice_mut(offset + DIRENT_HEADER_SIZE as u64, name.len()).copy_from_slice(name);
    });
    pm::flush_and_fence(pm, offset, total);
}

/// Reads back the header written by [`write`].
#[must_use]
pub fn read_header<R: PmRegion + ?Sized>(pm: &R, offset: u64) -> DirEntryHeader {
    *bytemuck::from_bytes(pm.slice(offset, DIRENT_HEADER_SIZE))
}

/// Reads back the name written by [`write`], using the header's
/// `name_len`.
#[must_use]
pub fn read_name<R: PmRegion + ?Sized>(pm: &R, offset: u64) -> alloc::vec::Vec<u8> {
    let header = read_header(pm, offset);
    pm.slice(offset + DIRENT_HEADER_SIZE as u64, header.name_len as usize).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::dirent_record_len;
    use crate::pmsim::PmSim;
    use crate::protect::NoopGate;

    #[test]
    fn write_then_read_round_trips_name_and_header() {
        let pm = PmSim::new(4096);
        let gate = NoopGate;
        write(&pm, &gate, 0, 7, 0o100644, false, 1, b"hello.txt", UnixTimestamp(42));

        let header = read_header(&pm, 0);
        assert_eq!({ header.ino }, 7);
        assert_eq!(header.name_len, 9);
        assert_eq!({ header.mtime }, UnixTimestamp(42));
        assert_eq!(read_name(&pm, 0), b"hello.txt");
    }

    #[test]
    fn record_len_is_four_byte_aligned() {
        for name_len in 0u8..=255 {
            assert_eq!(dirent_record_len(name_len) % 4, 0);
            assert!(dirent_record_len(name_len) as usize >= DIRENT_HEADER_SIZE + name_len as usize);
        }
    }

    #[test]
    fn inlined_inode_round_trips_and_is_cacheline_aligned() {
        let pm = PmSim::new(4096);
        let gate = NoopGate;
        write(&pm, &gate, 0, 9, 0o100644, false, 1, b"a.txt", UnixTimestamp(1));

        let inode_off = inline_inode_offset(0, 5);
        assert_eq!(inode_off % CACHELINE, 0);
        assert!(inode_off >= DIRENT_HEADER_SIZE as u64 + 5);

        let inode = RawInode::fresh(crate::blocktype::BlockType::Block4K);
        write_inlined_inode(&pm, &gate, 0, 5, &inode);
        assert_eq!(read_inlined_inode(&pm, 0, 5), inode);
    }
}
