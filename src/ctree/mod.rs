//! Immutable, bulk-built B+ tree run: one on-disk layer of an LSM container.

mod builder;
mod iter;
mod node;

pub use builder::Builder;
pub use iter::Cursor;

use crate::alloc::SpaceAllocator;
use crate::comparator::Comparator;
use crate::config::Config;
use crate::io::BlockIo;
use crate::pointer::CtreeDescriptor;
use std::sync::Arc;

/// A handle to one immutable C-tree run, described entirely by its on-disk descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ctree {
    descriptor: CtreeDescriptor,
}

impl Ctree {
    /// An empty run (height 0).
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptor: CtreeDescriptor::EMPTY,
        }
    }

    /// Wraps an already-known descriptor, e.g. one just decoded from a tree record.
    #[must_use]
    pub fn from_descriptor(descriptor: CtreeDescriptor) -> Self {
        Self { descriptor }
    }

    /// Returns `true` if this run holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptor.is_empty()
    }

    /// The current descriptor, as would be persisted in a tree record.
    #[must_use]
    pub fn descriptor(&self) -> CtreeDescriptor {
        self.descriptor
    }

    /// Replaces the run this handle points at, e.g. after a compaction installs a new
    /// descriptor at this layer.
    pub fn reset(&mut self, descriptor: CtreeDescriptor) {
        self.descriptor = descriptor;
    }

    /// Exchanges which run two handles point at.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Starts building a fresh run with a new [`Builder`].
    #[must_use]
    pub fn builder(io: Arc<dyn BlockIo>, alloc: Arc<dyn SpaceAllocator>, config: Config) -> Builder {
        Builder::new(io, alloc, config)
    }

    /// Opens a traversal [`Cursor`] over this run.
    #[must_use]
    pub fn cursor(&self, io: Arc<dyn BlockIo>, cmp: Arc<dyn Comparator>) -> Cursor {
        Cursor::new(io, cmp, self.descriptor.ptr, self.descriptor.height)
    }
}
