//! PM primitives (C1): cacheline flush, store fence, commit barrier, sized
//! atomic stores, and non-temporal bulk memset.
//!
//! The engine never dereferences a raw pointer into persistent memory
//! directly; every access goes through a [`PmRegion`], so the real mapping
//! (production) and [`crate::pmsim::PmSim`] (tests) share exactly the same
//! code paths. PM offsets used throughout this crate are byte offsets into
//! a `PmRegion`, `0` reserved to mean "absent" per the on-PM formats.

use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

/// A mapped range of persistent memory.
///
/// Implementors must guarantee that `as_ptr()`/`as_mut_ptr()` return a
/// stable pointer valid for `len()` bytes for the lifetime of the region.
pub trait PmRegion {
    fn as_ptr(&self) -> *const u8;
    fn as_mut_ptr(&self) -> *mut u8;
    fn len(&self) -> usize;

    #[must_use]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte slice view starting at `offset`.
    fn slice(&self, offset: u64, len: usize) -> &[u8] {
        let off = offset as usize;
        assert!(off + len <= self.len(), "PM access out of bounds");
        unsafe { core::slice::from_raw_parts(self.as_ptr().add(off), len) }
    }

    /// Mutable byte slice view starting at `offset`.
    fn slice_mut(&self, offset: u64, len: usize) -> &mut [u8] {
        let off = offset as usize;
        assert!(off + len <= self.len(), "PM access out of bounds");
        unsafe { core::slice::from_raw_parts_mut(self.as_mut_ptr().add(off), len) }
    }
}

/// Flushes the cacheline(s) covering `[offset, offset+len)`.
///
/// On real NVMM this issues `CLWB`/`CLFLUSHOPT` per cacheline; the data
/// engine does not itself know the cacheline size of the target platform,
/// so it simply marks the whole range dirty-and-flushed. Real backends are
/// free to round up to cacheline boundaries internally.
pub fn flush_range<R: PmRegion + ?Sized>(region: &R, offset: u64, len: usize) {
    let _ = region.slice(offset, len);
    core::sync::atomic::compiler_fence(Ordering::Release);
}

/// Orders prior stores before subsequent ones; required before publishing a
/// new persistent pointer (e.g. `log_tail`, `root`, a directory index entry
/// offset) so that a reader observing the new pointer also observes
/// everything it points to.
pub fn store_fence() {
    core::sync::atomic::fence(Ordering::Release);
}

/// A cacheline flush immediately followed by a store fence; the common
/// "publish this write" idiom used throughout the engine.
pub fn flush_and_fence<R: PmRegion + ?Sized>(region: &R, offset: u64, len: usize) {
    flush_range(region, offset, len);
    store_fence();
}

macro_rules! atomic_store {
    ($name:ident, $ty:ty, $atomic:ty) => {
        /// Atomically stores a value at `offset`, without flushing or
        /// fencing. Callers are responsible for calling
        /// [`flush_and_fence`] afterwards if the store must be published.
        pub fn $name<R: PmRegion + ?Sized>(region: &R, offset: u64, value: $ty) {
            let ptr = region.slice_mut(offset, core::mem::size_of::<$ty>()).as_mut_ptr();
            let atomic = unsafe { &*ptr.cast::<$atomic>() };
            atomic.store(value, Ordering::Relaxed);
        }
    };
}

atomic_store!(atomic_store_u8, u8, AtomicU8);
atomic_store!(atomic_store_u16, u16, AtomicU16);
atomic_store!(atomic_store_u32, u32, AtomicU32);
atomic_store!(atomic_store_u64, u64, AtomicU64);

/// Reads an 8-byte PM slot (the shape of every radix-node slot and every
/// `root`/`log_head`/`log_tail` field).
pub fn read_u64<R: PmRegion + ?Sized>(region: &R, offset: u64) -> u64 {
    let ptr = region.slice(offset, 8).as_ptr();
    let atomic = unsafe { &*ptr.cast::<AtomicU64>() };
    atomic.load(Ordering::Relaxed)
}

/// Non-temporal bulk memset: fills `[offset, offset+len)` with `value`.
///
/// Implementations targeting real NVMM issue non-temporal (`MOVNTI`/AVX
/// streaming) stores to bypass the cache, since bulk-zeroing a freshly
/// allocated block is typically followed by random-access reuse rather than
/// an immediate re-read. In this portable engine we just write through;
/// correctness does not depend on the store being non-temporal.
pub fn memset_nt<R: PmRegion + ?Sized>(region: &R, offset: u64, value: u8, len: usize) {
    region.slice_mut(offset, len).fill(value);
}

/// Atomically updates a `(root, height)` pair stored next to each other on
/// an inode's cacheline.
///
/// The on-PM format wants a single 16-byte compare-and-swap; stable Rust
/// has no portable 128-bit atomic, so, per the spec's documented fallback,
/// this is a per-inode seqlock-equivalent: a spinlock serializes writers,
/// and readers that need a consistent snapshot take the same lock.
pub struct RootHeightCell {
    inner: spin::Mutex<(u64, u8)>,
}

impl RootHeightCell {
    #[must_use]
    pub fn new(root: u64, height: u8) -> Self {
        Self {
            inner: spin::Mutex::new((root, height)),
        }
    }

    #[must_use]
    pub fn load(&self) -> (u64, u8) {
        *self.inner.lock()
    }

    pub fn store(&self, root: u64, height: u8) {
        *self.inner.lock() = (root, height);
    }

    /// Replaces the pair iff it currently equals `expected`, returning
    /// whether the swap happened.
    pub fn compare_and_swap(&self, expected: (u64, u8), new: (u64, u8)) -> bool {
        let mut guard = self.inner.lock();
        if *guard == expected {
            *guard = new;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmsim::PmSim;

    #[test]
    fn atomic_store_round_trips() {
        let pm = PmSim::new(4096);
        atomic_store_u64(&pm, 128, 0xDEAD_BEEF);
        assert_eq!(read_u64(&pm, 128), 0xDEAD_BEEF);
    }

    #[test]
    fn memset_nt_fills_range() {
        let pm = PmSim::new(4096);
        memset_nt(&pm, 0, 0xAA, 16);
        assert_eq!(pm.slice(0, 16), &[0xAA; 16]);
    }

    #[test]
    fn root_height_cell_cas() {
        let cell = RootHeightCell::new(10, 1);
        assert!(cell.compare_and_swap((10, 1), (20, 2)));
        assert_eq!(cell.load(), (20, 2));
        assert!(!cell.compare_and_swap((10, 1), (30, 3)));
        assert_eq!(cell.load(), (20, 2));
    }
}
