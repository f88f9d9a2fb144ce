//! The two-phase space allocator contract.
//!
//! `reserve` hands out a non-overlapping page extent that is usable immediately but not
//! yet durable; `commit` promotes it to persistent; `cancel` releases it without ever
//! having been persisted; `free` releases a previously committed extent. Between
//! `reserve` and its matching `commit`/`cancel`, no other caller may be handed
//! overlapping space - that invariant is the allocator implementation's responsibility,
//! not this crate's.

use crate::error::Result;

/// A page-addressed, two-phase space allocator.
pub trait SpaceAllocator {
    /// Reserves `size_pages` contiguous pages, returning their starting offset.
    ///
    /// The extent may be written and read immediately, but is not recorded as
    /// persistent until a matching [`SpaceAllocator::commit`].
    fn reserve(&self, size_pages: u64) -> Result<u64>;

    /// Promotes a previously reserved extent to persistent.
    fn commit(&self, offset_pages: u64, size_pages: u64) -> Result<()>;

    /// Releases a reservation that was never committed.
    fn cancel(&self, offset_pages: u64, size_pages: u64) -> Result<()>;

    /// Releases a previously committed extent.
    fn free(&self, offset_pages: u64, size_pages: u64) -> Result<()>;
}
