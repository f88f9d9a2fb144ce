//! A cheaply-clonable, zero-copy byte slice used for every key and value the engine
//! stores, both in the M-tree and inside C-tree node buffers.
//!
//! Wraps [`byteview::ByteView`]: cloning is a refcount bump, and [`Slice::slice`] takes a
//! zero-copy sub-range - exactly what node entry accessors need to hand back borrows
//! into a node's single owned buffer without unsafe lifetime tricks.

use byteview::ByteView;

/// An immutable, refcounted byte slice.
#[derive(Debug, Clone, Eq, Ord)]
pub struct Slice(ByteView);

impl Slice {
    /// Builds a [`Slice`] by copying `bytes`.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self(ByteView::new(bytes))
    }

    /// The empty slice.
    #[must_use]
    pub fn empty() -> Self {
        Self(ByteView::new(&[]))
    }

    /// Returns a zero-copy sub-slice over `range`.
    #[must_use]
    pub fn slice(&self, range: impl std::ops::RangeBounds<usize>) -> Self {
        Self(self.0.slice(range))
    }
}

impl AsRef<[u8]> for Slice {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for Slice {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&[u8]> for Slice {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for Slice {
    fn from(value: Vec<u8>) -> Self {
        Self(ByteView::from(value))
    }
}

impl<const N: usize> From<[u8; N]> for Slice {
    fn from(value: [u8; N]) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for Slice {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl PartialEq for Slice {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl<T: AsRef<[u8]>> PartialEq<T> for Slice {
    fn eq(&self, other: &T) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl PartialOrd for Slice {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.as_ref().cmp(other.as_ref()))
    }
}

impl std::hash::Hash for Slice {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_ref().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::Slice;

    #[test]
    fn slice_eq_and_deref() {
        let a = Slice::from(b"hello".as_slice());
        let b = Slice::new(b"hello");
        assert_eq!(a, b);
        assert_eq!(&*a, b"hello");
    }

    #[test]
    fn slice_subrange_is_zero_copy_view() {
        let a = Slice::from(b"hello world".as_slice());
        let sub = a.slice(6..11);
        assert_eq!(&*sub, b"world");
    }

    #[test]
    fn empty_slice_has_zero_length() {
        assert_eq!(Slice::empty().len(), 0);
    }
}
