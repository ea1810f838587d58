//! PMFS persistent data-structure core.
//!
//! This crate implements the on-PM data engine of a filesystem tailored for
//! byte-addressable persistent memory (PM): the per-inode radix block tree,
//! the append-only per-inode operation log with garbage collection, the
//! global inode table, the crash-consistency truncate list, and the in-DRAM
//! directory index rebuilt from the per-directory log.
//!
//! The block allocator, the memory-protection gate and the journaling module
//! are external collaborators; this crate only specifies the traits in
//! [`alloc_facade`], [`protect`] and [`journal`] that it consumes from them.
#![allow(clippy::mut_from_ref)]
#![no_std]

extern crate alloc;

pub mod alloc_facade;
pub mod blocktype;
pub mod dirent;
pub mod dirindex;
pub mod error;
pub mod hash;
pub mod inode;
pub mod journal;
pub mod lifecycle;
pub mod log;
pub mod params;
pub mod pm;
pub mod protect;
pub mod table;
pub mod time;
pub mod tree;
pub mod truncate_list;

#[cfg(any(test, feature = "pmsim"))]
pub mod pmsim;

pub use error::{BaseError, CanFail, PmfsError};
pub use params::Params;
