//! CRC64 checksumming of page-aligned node and log chunk buffers.

use crc::{Crc, CRC_64_XZ};

static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// A CRC64 checksum over a page-aligned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum(u64);

impl Checksum {
    /// Computes the checksum of `buf`.
    #[must_use]
    pub fn of(buf: &[u8]) -> Self {
        Self(CRC64.checksum(buf))
    }

    /// Wraps a raw checksum value (e.g. one read off disk).
    #[must_use]
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw 64-bit integer.
    #[must_use]
    pub fn into_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Checksum;

    #[test]
    fn checksum_deterministic() {
        let a = Checksum::of(b"hello world");
        let b = Checksum::of(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_sensitive_to_single_byte() {
        let a = Checksum::of(b"hello world");
        let b = Checksum::of(b"hello worle");
        assert_ne!(a, b);
    }

    #[test]
    fn checksum_roundtrips_through_raw() {
        let a = Checksum::of(b"some page of bytes");
        let b = Checksum::from_raw(a.into_u64());
        assert_eq!(a, b);
    }
}
