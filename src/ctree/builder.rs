//! Append-only bulk loader that turns a stream of already-sorted entries into one
//! immutable, page-addressed C-tree run.

use super::node::{ENTRY_HEADER_LEN, HEADER_LEN};
use crate::alloc::SpaceAllocator;
use crate::checksum::Checksum;
use crate::coding::Encode;
use crate::config::Config;
use crate::error::Result;
use crate::io::BlockIo;
use crate::pointer::{CtreeDescriptor, Pointer};
use byteorder::{ByteOrder, LittleEndian};
use std::sync::Arc;

struct LevelNode {
    buf: Vec<u8>,
    entries: usize,
}

impl LevelNode {
    fn new() -> Self {
        Self {
            buf: vec![0u8; HEADER_LEN],
            entries: 0,
        }
    }

    fn bytes(&self) -> usize {
        self.buf.len()
    }

    fn reset(&mut self) {
        self.buf.truncate(HEADER_LEN);
        self.buf.fill(0);
        self.entries = 0;
    }

    fn append(&mut self, key: &[u8], val: &[u8]) {
        let mut header = [0u8; ENTRY_HEADER_LEN];
        LittleEndian::write_u16(&mut header[0..2], key.len() as u16);
        LittleEndian::write_u16(&mut header[2..4], val.len() as u16);
        self.buf.extend_from_slice(&header);
        self.buf.extend_from_slice(key);
        self.buf.extend_from_slice(val);
        self.entries += 1;
    }

    fn first_key(&self) -> &[u8] {
        let key_len = LittleEndian::read_u16(&self.buf[HEADER_LEN..HEADER_LEN + 2]) as usize;
        &self.buf[HEADER_LEN + ENTRY_HEADER_LEN..HEADER_LEN + ENTRY_HEADER_LEN + key_len]
    }
}

/// Builds one C-tree run from entries appended in strictly increasing key order.
///
/// Nodes try to hold at least [`Config::min_fanout`] entries before they are allowed to
/// close on a page boundary, so a node can span multiple pages if a single entry run
/// exceeds one page. Every flushed node is promoted into a `(first_key, child_pointer)`
/// entry at the level above, recursively, until [`Builder::finish`] writes the final root.
pub struct Builder {
    io: Arc<dyn BlockIo>,
    alloc: Arc<dyn SpaceAllocator>,
    config: Config,
    levels: Vec<LevelNode>,
    reserved: Vec<(u64, u64)>,
    pages_reserved: u64,
}

impl Builder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(io: Arc<dyn BlockIo>, alloc: Arc<dyn SpaceAllocator>, config: Config) -> Self {
        Self {
            io,
            alloc,
            config,
            levels: Vec::new(),
            reserved: Vec::new(),
            pages_reserved: 0,
        }
    }

    /// Appends one entry at the leaf level. `key` must be strictly greater than every key
    /// appended so far; the builder does not check this itself.
    pub fn append(&mut self, key: &[u8], val: &[u8]) -> Result<()> {
        self.append_at(0, key, val)
    }

    fn append_at(&mut self, level: usize, key: &[u8], val: &[u8]) -> Result<()> {
        self.ensure_level(level);
        let added = ENTRY_HEADER_LEN + key.len() + val.len();
        if !self.can_append(level, added) {
            self.flush(level)?;
        }
        self.levels[level].append(key, val);
        Ok(())
    }

    fn ensure_level(&mut self, level: usize) {
        while self.levels.len() <= level {
            self.levels.push(LevelNode::new());
        }
    }

    fn can_append(&self, level: usize, added: usize) -> bool {
        let node = &self.levels[level];
        if node.entries + 1 <= self.config.min_fanout() {
            return true;
        }
        self.io.pages_for((node.bytes() + added) as u64) == self.io.pages_for(node.bytes() as u64)
    }

    fn reserve_pages(&mut self, size_pages: u64) -> Result<u64> {
        let offset = self.alloc.reserve(size_pages)?;
        self.pages_reserved += size_pages;

        if let Some(last) = self.reserved.last_mut() {
            if last.1 == offset {
                last.1 = offset + size_pages;
                return Ok(offset);
            }
        }
        self.reserved.push((offset, offset + size_pages));
        Ok(offset)
    }

    fn write_node(&mut self, level: usize) -> Result<Pointer> {
        let node_bytes = self.levels[level].bytes() as u64;
        let size_pages = self.io.pages_for(node_bytes);
        let offset = self.reserve_pages(size_pages)?;

        {
            let buf = &mut self.levels[level].buf;
            LittleEndian::write_u64(&mut buf[0..8], node_bytes);
            LittleEndian::write_u64(&mut buf[8..16], level as u64);
            buf.resize(self.io.bytes_for(size_pages) as usize, 0);
        }

        self.io.write(&self.levels[level].buf, size_pages, offset)?;
        let csum = Checksum::of(&self.levels[level].buf).into_u64();
        log::trace!("wrote ctree node: level={level} offset={offset} pages={size_pages}");
        Ok(Pointer {
            offs: offset,
            size: size_pages,
            csum,
        })
    }

    fn flush(&mut self, level: usize) -> Result<()> {
        if self.levels[level].entries == 0 {
            return Ok(());
        }

        let first_key = self.levels[level].first_key().to_vec();
        let ptr = self.write_node(level)?;
        let encoded_ptr = ptr.encode_into_vec();

        self.append_at(level + 1, &first_key, &encoded_ptr)?;
        self.levels[level].reset();
        Ok(())
    }

    /// Cascade-flushes every level below the top, writes the topmost non-empty node as the
    /// root, and returns the resulting descriptor together with every page range this
    /// builder reserved. Those ranges are not yet committed: the caller (the merge driver
    /// that holds the invariant of *when* a new run becomes durable) must call
    /// [`SpaceAllocator::commit`] on each of them once it is safe to do so, or
    /// [`Builder::cancel_ranges`] to release them instead. An untouched builder returns
    /// [`CtreeDescriptor::EMPTY`] with no ranges.
    pub fn finish(mut self) -> Result<(CtreeDescriptor, Vec<(u64, u64)>)> {
        if self.levels.is_empty() {
            return Ok((CtreeDescriptor::EMPTY, Vec::new()));
        }

        let mut level = 0;
        while level < self.levels.len() - 1 {
            self.flush(level)?;
            level += 1;
        }

        let top = self.levels.len() - 1;
        let ptr = self.write_node(top)?;
        let descriptor = CtreeDescriptor {
            ptr,
            pages: self.pages_reserved as u32,
            height: (top + 1) as u32,
        };
        log::debug!(
            "finished ctree build: height={} pages={}",
            descriptor.height,
            descriptor.pages
        );
        Ok((descriptor, self.reserved))
    }

    /// Releases every reservation made so far; the partially built tree leaves no
    /// persistent trace.
    pub fn cancel(self) {
        Self::cancel_ranges(self.alloc.as_ref(), &self.reserved);
    }

    /// Releases a set of previously reserved ranges, e.g. ones returned by
    /// [`Builder::finish`] when the caller decides not to commit after all.
    pub fn cancel_ranges(alloc: &dyn SpaceAllocator, ranges: &[(u64, u64)]) {
        for &(begin, end) in ranges {
            if let Err(err) = alloc.cancel(begin, end - begin) {
                log::warn!("failed to release ctree builder reservation [{begin}, {end}): {err}");
            }
        }
    }
}
