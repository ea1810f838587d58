//! Directory index (C8): a DRAM ordered map over a directory inode's log,
//! keyed by the name's BKDR hash (spec §3 "Directory index (DRAM)", §4.5).
//!
//! Uses [`alloc::collections::BTreeMap`] rather than a custom red-black
//! tree, per spec §3 "any ordered map suffices" and matching the teacher's
//! preference for `alloc`/`hashbrown` collections over hand-rolled ones
//! wherever the standard shape fits (e.g. `Vec<GroupDescriptor>` in
//! `Ext4Fs`). The index never owns PM; rebuilding from the log is always
//! the source of truth (spec §9 "Cyclic references").

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::hash::bkdr;
use crate::log::{LogEntry, LogEntryTag};
use crate::pm::PmRegion;

/// One directory-index node: `{hash, ino, pm_offset_of_dir_entry}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirIndexEntry {
    pub hash: u32,
    pub ino: u32,
    pub pm_offset: u64,
}

/// Outcome of [`DirectoryIndex::insert`]. The comparator is hash-only
/// (spec §9 open question): a second insert whose name hashes to an
/// already-present bucket is *not* distinguished by name and is reported
/// as a collision rather than silently inserted, preserving the source's
/// documented (if questionable) behavior instead of silently extending the
/// comparator to also compare names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// An entry already occupies this hash bucket; the caller (C9) is
    /// expected to surface this as `-EINVAL` at the syscall boundary, per
    /// spec §9's documented source behavior.
    HashCollision,
}

/// In-DRAM directory index for one directory inode.
#[derive(Clone, Debug, Default)]
pub struct DirectoryIndex {
    by_hash: BTreeMap<u32, DirIndexEntry>,
}

impl DirectoryIndex {
    #[must_use]
    pub fn new() -> Self {
        Self { by_hash: BTreeMap::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Looks up `name`'s entry. Only the first insert under a given hash
    /// is ever visible (spec §4.5 "Insert").
    #[must_use]
    pub fn lookup(&self, name: &[u8]) -> Option<&DirIndexEntry> {
        self.by_hash.get(&bkdr(name))
    }

    pub fn insert(&mut self, name: &[u8], ino: u32, pm_offset: u64) -> InsertOutcome {
        let hash = bkdr(name);
        if self.by_hash.contains_key(&hash) {
            return InsertOutcome::HashCollision;
        }
        self.by_hash.insert(hash, DirIndexEntry { hash, ino, pm_offset });
        InsertOutcome::Inserted
    }

    /// Removes the entry for `name`, if any (spec §4.5 "Remove").
    pub fn remove(&mut self, name: &[u8]) -> Option<DirIndexEntry> {
        self.by_hash.remove(&bkdr(name))
    }

    /// Entries in hash order, for diffing against a reference ordered map
    /// in scenario tests (spec §8 scenario 5).
    #[must_use]
    pub fn entries(&self) -> Vec<DirIndexEntry> {
        self.by_hash.values().copied().collect()
    }
}

/// Rebuilds a [`DirectoryIndex`] by replaying the directory inode's log
/// from `log_head` to `log_tail` (spec §4.5 "Rebuild from log").
/// `resolve_name` resolves a `DIR_LOG` entry's `block` field — the PM
/// offset of its directory entry record ([`crate::dirent`]) — to the
/// name bytes stored there, since a name cannot fit in the fixed 32-byte
/// log entry itself. Every log entry, `DIR_LOG` included, occupies exactly
/// one fixed slot in the page chain; the variable-length record (and, for
/// `new_inode` entries, the inlined raw inode copy cacheline-aligned after
/// it) lives in its own block named by `block`, not inline in the page
/// stream (spec §9 open question: the spec's "PM offset of the directory
/// entry record" phrasing is read as naming a record with its own
/// independent extent rather than one packed into the fixed-32-byte-slot
/// page array, which has no room for a variable-length payload).
pub fn rebuild_from_log<R: PmRegion + ?Sized>(
    pm: &R,
    log_head: u64,
    log_tail: u64,
    mut resolve_name: impl FnMut(&R, u64) -> alloc::vec::Vec<u8>,
) -> DirectoryIndex {
    let mut index = DirectoryIndex::new();
    let mut cur = log_head;

    while cur != 0 && cur != log_tail {
        let Some(normalized) = advance_past_tail(pm, cur) else { break };
        cur = normalized;
        if cur == log_tail {
            break;
        }

        let (page, idx) = split(cur);
        let entry = read_entry(pm, page, idx);

        match entry.tag {
            LogEntryTag::SetAttr | LogEntryTag::LinkChange => {
                cur += crate::params::LOG_ENTRY_SIZE as u64;
            }
            LogEntryTag::DirLog => {
                if is_last_dir_entry(&entry) {
                    break;
                }
                if entry.ino == 0 {
                    let name = resolve_name(pm, entry.block);
                    index.remove(&name);
                } else {
                    let name = resolve_name(pm, entry.block);
                    index.insert(&name, entry.ino, entry.block);
                }
                cur += crate::params::LOG_ENTRY_SIZE as u64;
            }
            LogEntryTag::FileWrite => {
                cur += crate::params::LOG_ENTRY_SIZE as u64;
            }
            _ => {
                // an unrecognized tag (zeroed/garbage slot) ends the walk
                break;
            }
        }
    }

    index
}

/// If `offset` has reached the tail record of its page (no room for even
/// one more fixed entry), follows the chain's `next_page` link and returns
/// the equivalent offset at the start of the next page; `None` if the
/// chain ends here. Otherwise returns `offset` unchanged (spec §4.2
/// "`ENTRY_LOC(p) = p & 0xFFF`... jumps to `next_page`", applied to the
/// directory-log read side of the same page-chain format).
fn advance_past_tail<R: PmRegion + ?Sized>(pm: &R, offset: u64) -> Option<u64> {
    let page = offset - (offset % crate::params::META_BLOCK_SIZE as u64);
    let rel = offset - page;
    if (rel as usize) < crate::params::LAST_ENTRY {
        return Some(offset);
    }
    let next = crate::log::read_next_page(pm, page);
    if next == 0 {
        return None;
    }
    Some(next)
}

/// No room left for even a zero-name entry, or an explicit zero-length
/// name marks the end of meaningful directory entries on this page (spec
/// §4.5 "Tail detection").
fn is_last_dir_entry(entry: &LogEntry) -> bool {
    entry.name_len == 0 && entry.ino == 0 && entry.block == 0
}

fn split(offset: u64) -> (u64, usize) {
    let page = offset - (offset % crate::params::META_BLOCK_SIZE as u64);
    let rel = (offset - page) as usize;
    (page, rel / crate::params::LOG_ENTRY_SIZE)
}

fn read_entry<R: PmRegion + ?Sized>(pm: &R, page: u64, idx: usize) -> LogEntry {
    let off = page + (idx * crate::params::LOG_ENTRY_SIZE) as u64;
    *bytemuck::from_bytes(pm.slice(off, crate::params::LOG_ENTRY_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_round_trips() {
        let mut index = DirectoryIndex::new();
        assert_eq!(index.insert(b"a", 5, 0x1000), InsertOutcome::Inserted);
        assert_eq!(index.lookup(b"a").unwrap().ino, 5);
    }

    #[test]
    fn remove_drops_entry() {
        let mut index = DirectoryIndex::new();
        index.insert(b"a", 5, 0x1000);
        assert!(index.remove(b"a").is_some());
        assert!(index.lookup(b"a").is_none());
    }

    #[test]
    fn distinct_names_do_not_collide() {
        let mut index = DirectoryIndex::new();
        index.insert(b"a", 1, 0x1000);
        index.insert(b"b", 2, 0x2000);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn hash_collision_is_reported_not_silently_merged() {
        let mut index = DirectoryIndex::new();
        // two distinct byte strings that BKDR happens to map to the same
        // bucket are indistinguishable to this comparator by construction;
        // simulate one directly by inserting the same hash twice.
        assert_eq!(index.insert(b"dup", 1, 0x1000), InsertOutcome::Inserted);
        assert_eq!(index.insert(b"dup", 2, 0x2000), InsertOutcome::HashCollision);
        assert_eq!(index.lookup(b"dup").unwrap().ino, 1);
    }
}
