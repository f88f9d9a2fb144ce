//! The page-addressed block I/O contract.
//!
//! Everything above this trait speaks in pages; the implementation alone knows the
//! physical `page_size`. This crate never opens a file or socket itself - an `BlockIo`
//! is injected at construction, the same capability-passing style the teacher uses for
//! its block device and descriptor table.

/// Page-addressed synchronous block I/O.
///
/// All offsets and sizes are in pages. Implementors supply their own `page_size`;
/// callers query it via [`BlockIo::page_size`] rather than assuming a constant.
pub trait BlockIo {
    /// The fixed page size of this device, in bytes. A power of two, >= 512.
    fn page_size(&self) -> u32;

    /// Reads `pages` pages starting at `page_offset` into `buf`.
    ///
    /// `buf` must be exactly `pages * page_size()` bytes.
    fn read(&self, buf: &mut [u8], pages: u64, page_offset: u64) -> std::io::Result<()>;

    /// Writes `pages` pages from `buf` starting at `page_offset`.
    ///
    /// `buf` must be exactly `pages * page_size()` bytes.
    fn write(&self, buf: &[u8], pages: u64, page_offset: u64) -> std::io::Result<()>;

    /// Flushes all prior writes to stable storage.
    fn sync(&self) -> std::io::Result<()>;

    /// Rounds `bytes` up to a whole number of pages, returning the page count.
    fn pages_for(&self, bytes: u64) -> u64 {
        let page_size = u64::from(self.page_size());
        bytes.div_ceil(page_size)
    }

    /// Returns the byte size of `pages` pages.
    fn bytes_for(&self, pages: u64) -> u64 {
        pages * u64::from(self.page_size())
    }
}
