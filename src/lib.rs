//! A persistent, ordered key-value storage engine built as a Log-Structured Merge tree
//! over a page-addressed block device.
//!
//! Keys and values are opaque byte strings ordered by a caller-supplied [`Comparator`],
//! not a compile-time `Ord` impl - the same total order has to be reconstructible from
//! just the bytes on disk, so it cannot be baked into a Rust type. Writes land in an
//! in-memory [`memtable::Memtable`] (`C0`); [`lsm::Lsm::merge`] is the only operation
//! that ever moves data downward, either freezing `C0` into `C1` or folding one layer
//! into the next through a bulk [`ctree::Builder`] rebuild. Reads fan out across every
//! layer through [`lsm::MergeIter`], newest layer winning ties.
//!
//! Nothing in this crate opens a file, socket, or thread of its own: the block device
//! ([`io::BlockIo`]) and the space allocator ([`alloc::SpaceAllocator`]) are both
//! supplied by the caller, so the engine is agnostic to what is actually backing a
//! volume.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alloc;
mod binary_search;
pub mod checksum;
pub mod coding;
pub mod comparator;
pub mod config;
pub mod ctree;
pub mod error;
pub mod io;
pub mod lsm;
pub mod memtable;
pub mod pointer;
pub mod slice;
pub mod txlog;

#[cfg(any(test, feature = "test-util"))]
pub mod testkit;

pub use comparator::{BytewiseComparator, Comparator};
pub use config::Config;
pub use error::{Error, IntegrityError, Result};
pub use lsm::{DefaultPolicy, Lsm, MergeIter, MergePolicy, TombstonePolicy};
pub use slice::Slice;
