//! Chunked, CRC'd, multi-page transaction log framer.
//!
//! A transaction accumulates application-defined items into an in-memory buffer,
//! flushing to a page-aligned, checksummed chunk whenever the next item would cross
//! [`Config::log_chunk_limit`] of pre-padding bytes. [`LogWriter::finish`] then writes a
//! chunk index describing every chunk and returns a single [`Pointer`] locating the whole
//! record; [`LogReader`] walks that index back to replay the items in order, verifying
//! each chunk's checksum as it goes - the read-side counterpart needed to rebuild
//! in-memory state after a restart.

use crate::alloc::SpaceAllocator;
use crate::checksum::Checksum;
use crate::coding::{Decode, Encode};
use crate::config::Config;
use crate::error::{Error, IntegrityError, Result};
use crate::io::BlockIo;
use crate::pointer::Pointer;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;
use std::sync::Arc;

const ITEM_HEADER_LEN: usize = 2;
const INDEX_HEADER_LEN: usize = 8;

/// Accumulates items into CRC-checksummed, page-aligned chunks.
///
/// Items must not be empty: a `{size: 0}` header is reserved as the end-of-real-data
/// sentinel a [`LogReader`] uses to stop before a chunk's zero-padded tail.
pub struct LogWriter {
    io: Arc<dyn BlockIo>,
    alloc: Arc<dyn SpaceAllocator>,
    chunk_limit: usize,
    buf: Vec<u8>,
    chunks: Vec<Pointer>,
    reserved: Vec<(u64, u64)>,
}

impl LogWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new(io: Arc<dyn BlockIo>, alloc: Arc<dyn SpaceAllocator>, config: Config) -> Self {
        Self {
            io,
            alloc,
            chunk_limit: config.log_chunk_limit(),
            buf: Vec::new(),
            chunks: Vec::new(),
            reserved: Vec::new(),
        }
    }

    /// Appends one item, flushing the current chunk first if `item` would push it past
    /// the configured pre-padding chunk limit.
    ///
    /// # Panics
    ///
    /// Panics if `item` is empty (reserved as the padding sentinel, see the type docs).
    pub fn append(&mut self, item: &[u8]) -> Result<()> {
        assert!(!item.is_empty(), "log items must not be empty");

        let added = ITEM_HEADER_LEN + item.len();
        if !self.buf.is_empty() && self.buf.len() + added > self.chunk_limit {
            self.flush_chunk()?;
        }
        self.buf.write_u16::<LittleEndian>(item.len() as u16)?;
        self.buf.extend_from_slice(item);
        Ok(())
    }

    fn flush_chunk(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let size_pages = self.io.pages_for(self.buf.len() as u64);
        let padded = self.io.bytes_for(size_pages) as usize;
        self.buf.resize(padded, 0);

        let result = self.reserve_and_write(size_pages);
        self.buf.clear();
        let ptr = result?;
        self.chunks.push(ptr);
        Ok(())
    }

    fn reserve_and_write(&mut self, size_pages: u64) -> Result<Pointer> {
        let offset = self.alloc.reserve(size_pages)?;
        if let Err(err) = self.io.write(&self.buf, size_pages, offset) {
            if let Err(cancel_err) = self.alloc.cancel(offset, size_pages) {
                log::warn!(
                    "failed to release log reservation [{offset}, {}): {cancel_err}",
                    offset + size_pages
                );
            }
            return Err(err.into());
        }
        self.reserved.push((offset, offset + size_pages));
        let csum = Checksum::of(&self.buf).into_u64();
        log::trace!("wrote log chunk: offset={offset} pages={size_pages}");
        Ok(Pointer {
            offs: offset,
            size: size_pages,
            csum,
        })
    }

    /// Flushes any partial chunk, writes the chunk index, commits every reservation this
    /// writer made, and returns a pointer to the whole log record.
    pub fn finish(mut self) -> Result<Pointer> {
        self.flush_chunk()?;

        let total_pages: u64 = self.reserved.iter().map(|&(begin, end)| end - begin).sum();

        let mut index_buf = Vec::with_capacity(INDEX_HEADER_LEN + self.chunks.len() * Pointer::ENCODED_LEN);
        index_buf.write_u32::<LittleEndian>(self.chunks.len() as u32)?;
        index_buf.write_u32::<LittleEndian>(total_pages as u32)?;
        for ptr in &self.chunks {
            ptr.encode_into(&mut index_buf)?;
        }

        let size_pages = self.io.pages_for(index_buf.len() as u64);
        let padded = self.io.bytes_for(size_pages) as usize;
        index_buf.resize(padded, 0);
        std::mem::swap(&mut self.buf, &mut index_buf);
        let index_ptr = self.reserve_and_write(size_pages)?;

        for &(begin, end) in &self.reserved {
            self.alloc.commit(begin, end - begin)?;
        }

        log::debug!(
            "finished log record: chunks={} pages={}",
            self.chunks.len(),
            index_ptr.size + total_pages
        );
        Ok(index_ptr)
    }

    /// Releases every reservation made so far; the log record leaves no persistent
    /// trace. Used after a failed `append`/`finish`, per the cancelled-but-partial
    /// contract: a flush failure only cancels the chunk that failed, so the caller must
    /// still call this to release any earlier chunks already reserved in this writer.
    pub fn cancel(self) {
        for (begin, end) in self.reserved {
            if let Err(err) = self.alloc.cancel(begin, end - begin) {
                log::warn!("failed to release log writer reservation [{begin}, {end}): {err}");
            }
        }
    }
}

/// Replays items out of a finished log record, verifying each chunk's checksum.
pub struct LogReader {
    io: Arc<dyn BlockIo>,
}

impl LogReader {
    /// Creates a reader over `io`.
    #[must_use]
    pub fn new(io: Arc<dyn BlockIo>) -> Self {
        Self { io }
    }

    /// Reads the chunk index at `ptr`, then replays every item across every chunk in
    /// order, calling `visit` for each. Each chunk's checksum is verified before its
    /// items are visited; the index's own checksum is verified first.
    pub fn replay(&self, ptr: &Pointer, mut visit: impl FnMut(&[u8]) -> Result<()>) -> Result<()> {
        for chunk_ptr in self.read_index(ptr)? {
            self.replay_chunk(&chunk_ptr, &mut visit)?;
        }
        Ok(())
    }

    fn read_index(&self, ptr: &Pointer) -> Result<Vec<Pointer>> {
        let buf = self.read_and_verify(ptr)?;
        let mut reader = std::io::Cursor::new(&buf[..]);
        let chunk_count = reader.read_u32::<LittleEndian>()? as usize;
        let _total_pages = reader.read_u32::<LittleEndian>()?;

        let mut chunks = Vec::with_capacity(chunk_count);
        for _ in 0..chunk_count {
            chunks.push(Pointer::decode_from(&mut reader)?);
        }
        Ok(chunks)
    }

    fn replay_chunk(&self, ptr: &Pointer, visit: &mut impl FnMut(&[u8]) -> Result<()>) -> Result<()> {
        let buf = self.read_and_verify(ptr)?;
        let mut offs = 0usize;
        while offs + ITEM_HEADER_LEN <= buf.len() {
            let item_len = u16::from_le_bytes([buf[offs], buf[offs + 1]]) as usize;
            if item_len == 0 {
                break;
            }
            offs += ITEM_HEADER_LEN;
            if offs + item_len > buf.len() {
                return Err(Error::Integrity(IntegrityError::EntryOverrun));
            }
            visit(&buf[offs..offs + item_len])?;
            offs += item_len;
        }
        Ok(())
    }

    fn read_and_verify(&self, ptr: &Pointer) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.io.bytes_for(ptr.size) as usize];
        self.io.read(&mut buf, ptr.size, ptr.offs)?;
        if Checksum::of(&buf).into_u64() != ptr.csum {
            return Err(Error::Integrity(IntegrityError::ChecksumMismatch));
        }
        Ok(buf)
    }
}
