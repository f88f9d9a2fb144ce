//! On-disk `Pointer` and `CtreeDescriptor` codecs.

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Number of on-disk C-tree layers held by an [`crate::lsm::Lsm`] container.
pub const MAX_DISK_TREES: usize = 8;

/// A page-aligned contiguous extent on disk, with its checksum.
///
/// Zero offset and zero size together mean "null" (no extent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pointer {
    /// Starting page offset of the extent.
    pub offs: u64,
    /// Size of the extent, in pages.
    pub size: u64,
    /// CRC64 of the full page-aligned buffer this pointer locates.
    pub csum: u64,
}

impl Pointer {
    /// The null pointer (zero offset, zero size).
    pub const NULL: Self = Self {
        offs: 0,
        size: 0,
        csum: 0,
    };

    /// On-disk size of an encoded `Pointer`, in bytes.
    pub const ENCODED_LEN: usize = 24;

    /// Returns `true` if this pointer locates no extent.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.offs == 0 && self.size == 0
    }
}

impl Encode for Pointer {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<LittleEndian>(self.offs)?;
        writer.write_u64::<LittleEndian>(self.size)?;
        writer.write_u64::<LittleEndian>(self.csum)?;
        Ok(())
    }
}

impl Decode for Pointer {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let offs = reader.read_u64::<LittleEndian>()?;
        let size = reader.read_u64::<LittleEndian>()?;
        let csum = reader.read_u64::<LittleEndian>()?;
        Ok(Self { offs, size, csum })
    }
}

/// The on-disk descriptor for one immutable C-tree run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CtreeDescriptor {
    /// Pointer to the root node. Meaningless when `height == 0`.
    pub ptr: Pointer,
    /// Total pages consumed by the run (all levels).
    pub pages: u32,
    /// Tree height in edges. `0` means the run is empty.
    pub height: u32,
}

impl CtreeDescriptor {
    /// The empty descriptor (height 0, null pointer, zero pages).
    pub const EMPTY: Self = Self {
        ptr: Pointer::NULL,
        pages: 0,
        height: 0,
    };

    /// On-disk size of an encoded `CtreeDescriptor`, in bytes.
    pub const ENCODED_LEN: usize = 32;

    /// Returns `true` if this run holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.height == 0
    }
}

impl Encode for CtreeDescriptor {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        self.ptr.encode_into(writer)?;
        writer.write_u32::<LittleEndian>(self.pages)?;
        writer.write_u32::<LittleEndian>(self.height)?;
        Ok(())
    }
}

impl Decode for CtreeDescriptor {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let ptr = Pointer::decode_from(reader)?;
        let pages = reader.read_u32::<LittleEndian>()?;
        let height = reader.read_u32::<LittleEndian>()?;
        Ok(Self { ptr, pages, height })
    }
}

/// Encodes the fixed-size `[CtreeDescriptor; MAX_DISK_TREES]` tree record.
#[must_use]
pub fn dump_tree_record(trees: &[CtreeDescriptor; MAX_DISK_TREES]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_DISK_TREES * CtreeDescriptor::ENCODED_LEN);
    for t in trees {
        t.encode_into(&mut buf).expect("writing to a Vec cannot fail");
    }
    buf
}

/// Decodes the fixed-size `[CtreeDescriptor; MAX_DISK_TREES]` tree record.
pub fn parse_tree_record(bytes: &[u8]) -> Result<[CtreeDescriptor; MAX_DISK_TREES], DecodeError> {
    if bytes.len() < MAX_DISK_TREES * CtreeDescriptor::ENCODED_LEN {
        return Err(DecodeError::Truncated);
    }
    let mut reader = std::io::Cursor::new(bytes);
    let mut out = [CtreeDescriptor::EMPTY; MAX_DISK_TREES];
    for slot in &mut out {
        *slot = CtreeDescriptor::decode_from(&mut reader)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_roundtrips() {
        let ptr = Pointer {
            offs: 77,
            size: 3,
            csum: 0xdead_beef_cafe_babe,
        };
        let bytes = ptr.encode_into_vec();
        assert_eq!(bytes.len(), Pointer::ENCODED_LEN);
        let back = Pointer::decode_from(&mut std::io::Cursor::new(&bytes)).unwrap();
        assert_eq!(ptr, back);
    }

    #[test]
    fn null_pointer_is_all_zero() {
        assert!(Pointer::NULL.is_null());
        assert_eq!(Pointer::NULL.encode_into_vec(), vec![0u8; 24]);
    }

    #[test]
    fn descriptor_roundtrips() {
        let d = CtreeDescriptor {
            ptr: Pointer {
                offs: 1,
                size: 2,
                csum: 3,
            },
            pages: 9,
            height: 4,
        };
        let bytes = d.encode_into_vec();
        assert_eq!(bytes.len(), CtreeDescriptor::ENCODED_LEN);
        let back = CtreeDescriptor::decode_from(&mut std::io::Cursor::new(&bytes)).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn tree_record_roundtrips() {
        let mut trees = [CtreeDescriptor::EMPTY; MAX_DISK_TREES];
        trees[3].height = 2;
        trees[3].pages = 10;
        trees[3].ptr = Pointer {
            offs: 5,
            size: 2,
            csum: 99,
        };

        let bytes = dump_tree_record(&trees);
        let back = parse_tree_record(&bytes).unwrap();
        assert_eq!(trees, back);
    }

    #[test]
    fn tree_record_rejects_truncated_input() {
        let bytes = vec![0u8; 4];
        assert!(matches!(parse_tree_record(&bytes), Err(DecodeError::Truncated)));
    }
}
