//! Crate-wide error type.

use crate::coding::{DecodeError, EncodeError};

/// Errors that can occur anywhere in the engine.
#[derive(Debug)]
pub enum Error {
    /// Allocation failure (in-memory or from the space allocator).
    OutOfMemory,

    /// The underlying block device failed a read, write, or sync.
    Io(std::io::Error),

    /// A checksum, level tag, or entry bound was violated on read.
    ///
    /// Surfaces only from readers; writers never manufacture this variant.
    Integrity(IntegrityError),

    /// An iterator boundary was hit, or a strict-equal lookup found nothing.
    ///
    /// Not necessarily fatal: callers use this as the "no more" / "not found" signal.
    NotFound,

    /// The space allocator has no free extent large enough right now.
    OutOfSpace,

    /// The space allocator is temporarily unable to service the request.
    Busy,

    /// An on-disk descriptor could not be serialized.
    Encode(EncodeError),

    /// An on-disk descriptor could not be deserialized.
    Decode(DecodeError),

    /// A `Config` value failed validation (e.g. non-power-of-two page size).
    InvalidConfig(&'static str),
}

/// The specific invariant a data-integrity failure violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityError {
    /// CRC64 of the loaded buffer did not match the pointer's recorded checksum.
    ChecksumMismatch,
    /// The node header's `level` did not match the level expected by the descent.
    LevelMismatch { expected: u64, found: u64 },
    /// An entry header claimed more bytes than remain in the node buffer.
    EntryOverrun,
    /// An internal node's value was not exactly `size_of::<Pointer>()` bytes.
    BadPointerSize,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::Integrity(e) => write!(f, "integrity error: {e:?}"),
            Self::NotFound => write!(f, "not found"),
            Self::OutOfSpace => write!(f, "allocator out of space"),
            Self::Busy => write!(f, "allocator busy"),
            Self::Encode(e) => write!(f, "encode error: {e}"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
