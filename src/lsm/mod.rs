//! The container tying an in-memory write buffer to a bounded stack of on-disk runs.
//!
//! Layers are numbered newest to oldest: `0` is `C0` (the active write buffer), `1` is
//! `C1` (frozen while a flush drains it), and `2..2+MAX_DISK_TREES` are the on-disk
//! C-tree runs `disk[0..MAX_DISK_TREES]`. A read consults every layer through
//! [`MergeIter`] and the smallest-index match wins; [`Lsm::merge`] is the only operation
//! that ever moves data from one layer to the next.

mod merge_iter;
mod policy;

pub use merge_iter::MergeIter;
pub use policy::{DefaultPolicy, MergePolicy, TombstonePolicy};

use self::merge_iter::SubIter;
use crate::alloc::SpaceAllocator;
use crate::comparator::Comparator;
use crate::config::Config;
use crate::ctree::{Builder, Ctree};
use crate::error::Result;
use crate::io::BlockIo;
use crate::memtable::Memtable;
use crate::pointer::{dump_tree_record, parse_tree_record, CtreeDescriptor, MAX_DISK_TREES};
use crate::slice::Slice;
use std::sync::Arc;

/// Total addressable layers: `C0`, `C1`, and `MAX_DISK_TREES` on-disk runs.
const LAYER_COUNT: usize = 2 + MAX_DISK_TREES;

/// An ordered key-value container: one active M-tree, one frozen M-tree, and a bounded
/// stack of immutable on-disk C-tree runs.
pub struct Lsm {
    io: Arc<dyn BlockIo>,
    alloc: Arc<dyn SpaceAllocator>,
    cmp: Arc<dyn Comparator>,
    config: Config,
    c0: Memtable,
    c1: Memtable,
    disk: [Ctree; MAX_DISK_TREES],
}

impl Lsm {
    /// Creates an empty container over the given capabilities.
    #[must_use]
    pub fn new(io: Arc<dyn BlockIo>, alloc: Arc<dyn SpaceAllocator>, cmp: Arc<dyn Comparator>, config: Config) -> Self {
        Self {
            io,
            alloc,
            c0: Memtable::new(cmp.clone()),
            c1: Memtable::new(cmp.clone()),
            cmp,
            config,
            disk: [Ctree::new(); MAX_DISK_TREES],
        }
    }

    /// Inserts `key`/`val` into the active write buffer. A duplicate key replaces the
    /// existing value; nothing is written to disk until [`Lsm::merge`] flushes it.
    pub fn add(&mut self, key: impl Into<Slice>, val: impl Into<Slice>) {
        self.c0.insert(key, val);
    }

    /// Opens a read cursor spanning every layer, newest to oldest.
    #[must_use]
    pub fn cursor(&self) -> MergeIter<'_> {
        let layers: Vec<Box<dyn SubIter + '_>> = (0..LAYER_COUNT).map(|i| self.cursor_for(i)).collect();
        MergeIter::new(layers, self.cmp.clone())
    }

    /// Encodes the current on-disk layer descriptors as a fixed-size tree record, e.g.
    /// for embedding in a superblock or root record.
    #[must_use]
    pub fn dump(&self) -> Vec<u8> {
        let mut trees = [CtreeDescriptor::EMPTY; MAX_DISK_TREES];
        for (slot, tree) in trees.iter_mut().zip(self.disk.iter()) {
            *slot = tree.descriptor();
        }
        dump_tree_record(&trees)
    }

    /// Replaces every on-disk layer descriptor from a previously [`Lsm::dump`]ped tree
    /// record. `C0`/`C1` are left untouched: they hold data that has no on-disk
    /// representation of their own.
    pub fn parse(&mut self, bytes: &[u8]) -> Result<()> {
        let trees = parse_tree_record(bytes)?;
        for (slot, descriptor) in self.disk.iter_mut().zip(trees) {
            slot.reset(descriptor);
        }
        Ok(())
    }

    fn cursor_for(&self, idx: usize) -> Box<dyn SubIter + '_> {
        match idx {
            0 => Box::new(self.c0.cursor()),
            1 => Box::new(self.c1.cursor()),
            i => Box::new(self.disk[i - 2].cursor(self.io.clone(), self.cmp.clone())),
        }
    }

    fn layer_is_empty(&self, idx: usize) -> bool {
        match idx {
            0 => self.c0.is_empty(),
            1 => self.c1.is_empty(),
            i => self.disk[i - 2].is_empty(),
        }
    }

    fn reset_layer(&mut self, idx: usize) {
        match idx {
            0 => self.c0.reset(),
            1 => self.c1.reset(),
            i => self.disk[i - 2].reset(CtreeDescriptor::EMPTY),
        }
    }

    fn install(&mut self, idx: usize, descriptor: CtreeDescriptor) {
        debug_assert!(idx >= 2, "a merge destination is always an on-disk layer");
        self.disk[idx - 2].reset(descriptor);
    }

    fn swap_layers(&mut self, source: usize, dest: usize) {
        match (source, dest) {
            (0, 1) => self.c0.swap(&mut self.c1),
            (a, b) if a >= 2 && b >= 2 => self.disk.swap(a - 2, b - 2),
            _ => unreachable!("layer {source} and {dest} hold different representations"),
        }
    }

    /// Moves layer `target` one step toward disk, merging it with layer `target + 1`.
    ///
    /// `target == 0` additionally performs the `C0`/`C1` swap first (requiring `C1` to be
    /// empty), then continues as `target == 1`: the single call that drains the active
    /// write buffer both freezes it and flushes it into `disk[0]`.
    ///
    /// For every other `target`, if layer `target + 1` is already empty and both layers
    /// have the same representation, the move is a cheap structural swap; otherwise the
    /// two layers are merged through [`MergeIter`] into a freshly bulk-built run, which
    /// then replaces layer `target + 1` while layer `target` is cleared.
    ///
    /// # Panics
    ///
    /// Panics if `target + 1 >= ` the number of layers (`2 + MAX_DISK_TREES`).
    pub fn merge(&mut self, mut target: usize, policy: &dyn MergePolicy) -> Result<()> {
        assert!(target + 1 < LAYER_COUNT, "merge target leaves no destination layer");

        if target == 0 {
            assert!(self.c1.is_empty(), "cannot flush C0 while C1 is still draining");
            self.swap_layers(0, 1);
            target = 1;
        }

        let dest = target + 1;

        // C1 -> disk[0] always crosses representations (M-tree to C-tree) and so can
        // never take the cheap structural-swap path, even when disk[0] is empty.
        if target != 1 && self.layer_is_empty(dest) {
            self.swap_layers(target, dest);
            return Ok(());
        }

        self.rebuild(target, dest, policy)
    }

    fn rebuild(&mut self, source: usize, dest: usize, policy: &dyn MergePolicy) -> Result<()> {
        let drop_permitted = (0..source).all(|i| self.layer_is_empty(i)) && (dest + 1..LAYER_COUNT).all(|i| self.layer_is_empty(i));

        let mut builder = Ctree::builder(self.io.clone(), self.alloc.clone(), self.config);

        if let Err(err) = self.feed_builder(source, dest, drop_permitted, policy, &mut builder) {
            builder.cancel();
            return Err(err);
        }

        policy.before_finish();
        let (descriptor, ranges) = builder.finish()?;
        for &(begin, end) in &ranges {
            self.alloc.commit(begin, end - begin)?;
        }

        self.install(dest, descriptor);
        self.reset_layer(source);
        policy.after_finish();
        Ok(())
    }

    fn feed_builder(
        &self,
        source: usize,
        dest: usize,
        drop_permitted: bool,
        policy: &dyn MergePolicy,
        builder: &mut Builder,
    ) -> Result<()> {
        let layers = vec![self.cursor_for(source), self.cursor_for(dest)];
        let mut iter = MergeIter::new(layers, self.cmp.clone());
        iter.begin()?;

        while let (Some(key), Some(val)) = (iter.key().cloned(), iter.value().cloned()) {
            if !(drop_permitted && policy.drop_deleted(&key, &val)) {
                builder.append(&key, &val)?;
            }
            iter.next()?;
        }
        Ok(())
    }
}
