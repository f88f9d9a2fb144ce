//! A single C-tree node: a page-aligned buffer of length-prefixed key/value entries.
//!
//! On-disk layout: a 16-byte header (`size: u64`, `level: u64`), followed by entries packed
//! back-to-back with no padding: `key_size: u16`, `val_size: u16`, then the key bytes, then
//! the value bytes. `size` counts the header plus every entry actually written; the buffer
//! may extend further, zero-padded out to a page boundary.

use crate::binary_search::partition_point;
use crate::checksum::Checksum;
use crate::coding::Decode;
use crate::comparator::Comparator;
use crate::error::{Error, IntegrityError, Result};
use crate::pointer::Pointer;
use crate::slice::Slice;
use byteorder::{ByteOrder, LittleEndian};

pub(super) const HEADER_LEN: usize = 16;
pub(super) const ENTRY_HEADER_LEN: usize = 4;

#[derive(Clone, Copy)]
struct EntrySpan {
    key_off: usize,
    key_len: usize,
    val_off: usize,
    val_len: usize,
}

/// A parsed, read-only C-tree node backed by one zero-copy buffer.
pub(super) struct Node {
    buf: Slice,
    entries: Vec<EntrySpan>,
    level: u32,
}

impl Node {
    /// Parses a just-read page-aligned buffer, verifying its checksum against `ptr` and its
    /// recorded level against `expected_level`.
    pub(super) fn parse(buf: Slice, ptr: &Pointer, expected_level: u32) -> Result<Self> {
        if Checksum::of(&buf).into_u64() != ptr.csum {
            return Err(Error::Integrity(IntegrityError::ChecksumMismatch));
        }
        if buf.len() < HEADER_LEN {
            return Err(Error::Integrity(IntegrityError::EntryOverrun));
        }

        let size = LittleEndian::read_u64(&buf[0..8]) as usize;
        let level = LittleEndian::read_u64(&buf[8..16]) as u32;

        if size > buf.len() {
            return Err(Error::Integrity(IntegrityError::EntryOverrun));
        }
        if level != expected_level {
            return Err(Error::Integrity(IntegrityError::LevelMismatch {
                expected: u64::from(expected_level),
                found: u64::from(level),
            }));
        }

        let mut entries = Vec::new();
        let mut offs = HEADER_LEN;
        while offs != size {
            if offs + ENTRY_HEADER_LEN > size {
                return Err(Error::Integrity(IntegrityError::EntryOverrun));
            }
            let key_len = LittleEndian::read_u16(&buf[offs..offs + 2]) as usize;
            let val_len = LittleEndian::read_u16(&buf[offs + 2..offs + 4]) as usize;
            offs += ENTRY_HEADER_LEN;

            if offs + key_len + val_len > size {
                return Err(Error::Integrity(IntegrityError::EntryOverrun));
            }
            entries.push(EntrySpan {
                key_off: offs,
                key_len,
                val_off: offs + key_len,
                val_len,
            });
            offs += key_len + val_len;
        }

        Ok(Self { buf, entries, level })
    }

    pub(super) fn level(&self) -> u32 {
        self.level
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(super) fn key(&self, pos: usize) -> Slice {
        let e = self.entries[pos];
        self.buf.slice(e.key_off..e.key_off + e.key_len)
    }

    pub(super) fn value(&self, pos: usize) -> Slice {
        let e = self.entries[pos];
        self.buf.slice(e.val_off..e.val_off + e.val_len)
    }

    /// Decodes the value at `pos` as a child [`Pointer`] (only meaningful on internal
    /// levels, where values are encoded child pointers rather than user values).
    pub(super) fn child_pointer(&self, pos: usize) -> Result<Pointer> {
        let v = self.value(pos);
        if v.len() != Pointer::ENCODED_LEN {
            return Err(Error::Integrity(IntegrityError::BadPointerSize));
        }
        Ok(Pointer::decode_from(&mut std::io::Cursor::new(&*v))?)
    }

    /// First index whose key is `>= target`, or `len()` if every key is smaller.
    pub(super) fn lower_bound(&self, target: &[u8], cmp: &dyn Comparator) -> usize {
        partition_point(&self.entries, |e| {
            cmp.compare(&self.buf[e.key_off..e.key_off + e.key_len], target) == std::cmp::Ordering::Less
        })
    }

    /// First index whose key is `> target`, or `len()` if no key is larger.
    pub(super) fn upper_bound(&self, target: &[u8], cmp: &dyn Comparator) -> usize {
        partition_point(&self.entries, |e| {
            cmp.compare(&self.buf[e.key_off..e.key_off + e.key_len], target) != std::cmp::Ordering::Greater
        })
    }
}
