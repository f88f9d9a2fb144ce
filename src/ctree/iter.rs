//! C-tree traversal: a stack of `(node, index)` pairs, one per level.
//!
//! Nodes are read on demand and CRC-verified as they are visited, so `begin()`/`end()` pay
//! I/O only for the spine they descend, and `next()`/`prev()` only reload the levels whose
//! position actually changed.

use super::node::Node;
use crate::comparator::Comparator;
use crate::error::Result;
use crate::io::BlockIo;
use crate::pointer::Pointer;
use crate::slice::Slice;
use std::sync::Arc;

struct Loaded {
    ptr: Pointer,
    node: Node,
}

/// A position into one C-tree run.
pub struct Cursor {
    io: Arc<dyn BlockIo>,
    cmp: Arc<dyn Comparator>,
    root: Pointer,
    height: u32,
    levels: Vec<Option<Loaded>>,
    pos: Vec<usize>,
}

impl Cursor {
    pub(super) fn new(io: Arc<dyn BlockIo>, cmp: Arc<dyn Comparator>, root: Pointer, height: u32) -> Self {
        let n = height as usize;
        Self {
            io,
            cmp,
            root,
            height,
            levels: (0..n).map(|_| None).collect(),
            pos: vec![0; n],
        }
    }

    fn get_node(&mut self, level: usize, ptr: &Pointer) -> Result<()> {
        if let Some(loaded) = &self.levels[level] {
            if &loaded.ptr == ptr {
                return Ok(());
            }
        }
        let mut buf = vec![0u8; self.io.bytes_for(ptr.size) as usize];
        self.io.read(&mut buf, ptr.size, ptr.offs)?;
        let node = Node::parse(Slice::from(buf), ptr, level as u32)?;
        self.levels[level] = Some(Loaded { ptr: *ptr, node });
        Ok(())
    }

    fn node(&self, level: usize) -> &Node {
        &self.levels[level].as_ref().expect("node must be loaded before use").node
    }

    /// Descends the left spine. A no-op on an empty tree.
    pub fn begin(&mut self) -> Result<()> {
        if self.height == 0 {
            return Ok(());
        }
        let mut ptr = self.root;
        for level in (0..self.height as usize).rev() {
            self.get_node(level, &ptr)?;
            self.pos[level] = 0;
            if level != 0 {
                ptr = self.node(level).child_pointer(0)?;
            }
        }
        Ok(())
    }

    /// Descends the right spine, then steps one past the last leaf entry.
    pub fn end(&mut self) -> Result<()> {
        if self.height == 0 {
            return Ok(());
        }
        let mut ptr = self.root;
        for level in (0..self.height as usize).rev() {
            self.get_node(level, &ptr)?;
            let last = self.node(level).len() - 1;
            self.pos[level] = last;
            if level != 0 {
                ptr = self.node(level).child_pointer(last)?;
            }
        }
        self.pos[0] += 1;
        Ok(())
    }

    /// Descends to the leaf level that would contain `key`: internal levels use
    /// `upper_bound` then step back one (the rightmost child whose first key is `<=
    /// target`); the leaf uses `lower_bound`.
    fn descend_to_leaf(&mut self, key: &[u8]) -> Result<()> {
        if self.height == 0 {
            return Ok(());
        }
        let mut ptr = self.root;
        for level in (1..self.height as usize).rev() {
            self.get_node(level, &ptr)?;
            let mut pos = self.node(level).upper_bound(key, self.cmp.as_ref());
            if pos > 0 {
                pos -= 1;
            }
            self.pos[level] = pos;
            ptr = self.node(level).child_pointer(pos)?;
        }
        self.get_node(0, &ptr)?;
        self.pos[0] = self.node(0).lower_bound(key, self.cmp.as_ref());
        Ok(())
    }

    /// Positions at the first entry whose key is `>= key`, or at `end()` if none.
    pub fn lower_bound(&mut self, key: &[u8]) -> Result<()> {
        if self.height == 0 {
            return Ok(());
        }
        self.descend_to_leaf(key)?;
        if self.pos[0] == self.node(0).len() {
            self.next()?;
        }
        Ok(())
    }

    /// Positions at the first entry whose key is `> key`, or at `end()` if none.
    pub fn upper_bound(&mut self, key: &[u8]) -> Result<()> {
        if self.height == 0 {
            return Ok(());
        }
        self.lower_bound(key)?;
        if self.pos[0] == self.node(0).len() {
            return Ok(());
        }
        let at_key = self.cmp.compare(self.node(0).key(self.pos[0]).as_ref(), key) != std::cmp::Ordering::Greater;
        if at_key {
            self.next()?;
        }
        Ok(())
    }

    /// Positions at `key`, reporting whether an entry with that exact key exists.
    pub fn lookup(&mut self, key: &[u8]) -> Result<bool> {
        if self.height == 0 {
            return Ok(false);
        }
        self.lower_bound(key)?;
        if self.pos[0] == self.node(0).len() {
            return Ok(false);
        }
        Ok(self.cmp.compare(self.node(0).key(self.pos[0]).as_ref(), key) == std::cmp::Ordering::Equal)
    }

    /// Advances to the next entry. Returns `false` at `end()`, leaving the cursor there.
    pub fn next(&mut self) -> Result<bool> {
        if self.height == 0 {
            return Ok(false);
        }

        let mut level_to_move = None;
        for i in 0..self.height as usize {
            if self.pos[i] + 1 < self.node(i).len() {
                level_to_move = Some(i);
                break;
            }
        }

        let level = match level_to_move {
            Some(level) => level,
            None => {
                let leaf_entries = self.node(0).len();
                if self.pos[0] != leaf_entries {
                    self.pos[0] += 1;
                }
                return Ok(false);
            }
        };

        for i in 0..level {
            self.levels[i] = None;
        }
        self.pos[level] += 1;

        for i in (0..level).rev() {
            let ptr = self.node(i + 1).child_pointer(self.pos[i + 1])?;
            self.get_node(i, &ptr)?;
            self.pos[i] = 0;
        }
        Ok(true)
    }

    /// Steps back to the previous entry. Returns `false` at the very first entry.
    pub fn prev(&mut self) -> Result<bool> {
        if self.height == 0 {
            return Ok(false);
        }

        let mut level_to_move = None;
        for i in 0..self.height as usize {
            if self.pos[i] > 0 {
                level_to_move = Some(i);
                break;
            }
        }

        let level = match level_to_move {
            Some(level) => level,
            None => return Ok(false),
        };

        for i in 0..level {
            self.levels[i] = None;
        }
        self.pos[level] -= 1;

        for i in (0..level).rev() {
            let ptr = self.node(i + 1).child_pointer(self.pos[i + 1])?;
            self.get_node(i, &ptr)?;
            let entries = self.node(i).len();
            self.pos[i] = entries - 1;
        }
        Ok(true)
    }

    /// The key at the current position, or `None` at `end()` or on an empty tree.
    #[must_use]
    pub fn key(&self) -> Option<Slice> {
        if self.height == 0 || self.pos[0] == self.node(0).len() {
            return None;
        }
        Some(self.node(0).key(self.pos[0]))
    }

    /// The value at the current position, or `None` at `end()` or on an empty tree.
    #[must_use]
    pub fn value(&self) -> Option<Slice> {
        if self.height == 0 || self.pos[0] == self.node(0).len() {
            return None;
        }
        Some(self.node(0).value(self.pos[0]))
    }
}
