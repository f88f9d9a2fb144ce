//! In-memory [`BlockIo`] and [`SpaceAllocator`] implementations used by this crate's own
//! tests and benches, and exposed to downstream users under the `test-util` feature so
//! they can exercise their own code against this engine without a real block device.

use crate::alloc::SpaceAllocator;
use crate::error::Result;
use crate::io::BlockIo;
use std::sync::Mutex;

/// An in-memory block device backed by a growable byte buffer. Writes past the current
/// end grow the buffer, zero-filling the gap.
pub struct MemIo {
    page_size: u32,
    data: Mutex<Vec<u8>>,
}

impl MemIo {
    /// Creates an empty device with the given page size.
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            data: Mutex::new(Vec::new()),
        }
    }
}

impl BlockIo for MemIo {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn read(&self, buf: &mut [u8], pages: u64, page_offset: u64) -> std::io::Result<()> {
        let data = self.data.lock().expect("MemIo mutex poisoned");
        let start = page_offset as usize * self.page_size as usize;
        let len = pages as usize * self.page_size as usize;
        if start + len > data.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read past end of MemIo",
            ));
        }
        buf[..len].copy_from_slice(&data[start..start + len]);
        Ok(())
    }

    fn write(&self, buf: &[u8], pages: u64, page_offset: u64) -> std::io::Result<()> {
        let mut data = self.data.lock().expect("MemIo mutex poisoned");
        let start = page_offset as usize * self.page_size as usize;
        let len = pages as usize * self.page_size as usize;
        if data.len() < start + len {
            data.resize(start + len, 0);
        }
        data[start..start + len].copy_from_slice(&buf[..len]);
        Ok(())
    }

    fn sync(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A bump-pointer [`SpaceAllocator`]: `reserve` hands out the next free page range and
/// never reuses space, even after `free`/`cancel`. Sufficient for tests that only care
/// about non-overlap and net-zero outstanding-reservation accounting, not reclamation.
pub struct BumpAlloc {
    next: Mutex<u64>,
    reserved_pages: Mutex<u64>,
    committed_pages: Mutex<u64>,
}

impl BumpAlloc {
    /// Creates an allocator with nothing reserved.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: Mutex::new(0),
            reserved_pages: Mutex::new(0),
            committed_pages: Mutex::new(0),
        }
    }

    /// Pages currently reserved but neither committed nor cancelled. Tests use this to
    /// assert that a builder's `cancel()` returns the allocator to net zero.
    #[must_use]
    pub fn outstanding_reserved_pages(&self) -> u64 {
        *self.reserved_pages.lock().expect("BumpAlloc mutex poisoned")
    }

    /// Total pages currently committed.
    #[must_use]
    pub fn committed_pages(&self) -> u64 {
        *self.committed_pages.lock().expect("BumpAlloc mutex poisoned")
    }
}

impl Default for BumpAlloc {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceAllocator for BumpAlloc {
    fn reserve(&self, size_pages: u64) -> Result<u64> {
        let mut next = self.next.lock().expect("BumpAlloc mutex poisoned");
        let offset = *next;
        *next += size_pages;
        *self.reserved_pages.lock().expect("BumpAlloc mutex poisoned") += size_pages;
        Ok(offset)
    }

    fn commit(&self, _offset_pages: u64, size_pages: u64) -> Result<()> {
        *self.reserved_pages.lock().expect("BumpAlloc mutex poisoned") -= size_pages;
        *self.committed_pages.lock().expect("BumpAlloc mutex poisoned") += size_pages;
        Ok(())
    }

    fn cancel(&self, _offset_pages: u64, size_pages: u64) -> Result<()> {
        *self.reserved_pages.lock().expect("BumpAlloc mutex poisoned") -= size_pages;
        Ok(())
    }

    fn free(&self, _offset_pages: u64, size_pages: u64) -> Result<()> {
        *self.committed_pages.lock().expect("BumpAlloc mutex poisoned") -= size_pages;
        Ok(())
    }
}
