//! Truncate list (C7): a PM-resident singly-linked list of inodes with
//! pending deferred block reclamation, used to survive a crash between
//! "start freeing blocks" and "finish freeing blocks" (spec §4.4).
//!
//! The list is rooted at a well-known head record external to this crate
//! (part of the superblock, out of scope); callers pass the head's current
//! value in and get the updated value back, the same by-value threading
//! style used for [`crate::tree::TreeRoot`].

use crate::inode::RawInode;
use crate::pm;

/// `truncate_add` (spec §4.4 steps 1-4): links `ino` onto the head of the
/// list with `truncate_size` recorded on its slot, under the caller's
/// `s_truncate_lock` equivalent. The caller is expected to persist `slot`
/// (flush + fence) and then publish the returned head value; `in_journal_txn`
/// skips the extra barrier this function would otherwise insert between
/// those two publications, since a journal commit already provides one.
pub fn truncate_add(head: u64, ino: u64, slot: &mut RawInode, truncate_size: u64, in_journal_txn: bool) -> u64 {
    slot.truncate_next = head;
    slot.truncate_size = truncate_size;

    if !in_journal_txn {
        pm::store_fence();
    }

    ino
}

/// `truncate_del` (spec §4.4): removes `ino` from the list by rewriting
/// its predecessor's `next` link. `lookup` resolves an inode number to its
/// current `truncate_next`; `write_next` persists a new `truncate_next`
/// for the inode it names.
pub fn truncate_del(
    head: u64,
    ino: u64,
    mut lookup: impl FnMut(u64) -> u64,
    mut write_next: impl FnMut(u64, u64),
) -> u64 {
    if head == ino {
        return lookup(ino);
    }

    let mut prev = head;
    loop {
        if prev == 0 {
            return head; // not found; list unchanged
        }
        let next = lookup(prev);
        if next == ino {
            let after = lookup(ino);
            write_next(prev, after);
            return head;
        }
        prev = next;
    }
}

/// Walks the list from `head`, invoking `recover` on each inode number in
/// link order. Used at mount to complete truncation/freeing work that was
/// interrupted by a crash (spec §4.4 "Recovery at mount").
pub fn recover(head: u64, mut lookup_next: impl FnMut(u64) -> u64, mut recover_one: impl FnMut(u64)) {
    let mut cur = head;
    while cur != 0 {
        let next = lookup_next(cur);
        recover_one(cur);
        cur = next;
    }
}
