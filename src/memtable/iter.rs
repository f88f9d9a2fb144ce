use super::Memtable;
use crate::slice::Slice;

type Link = Option<u32>;

/// A position into a [`Memtable`]. Cheap to create; does not outlive the map it borrows.
pub struct Cursor<'a> {
    tree: &'a Memtable,
    node: Link,
}

impl<'a> Cursor<'a> {
    pub(super) fn new(tree: &'a Memtable) -> Self {
        Self { tree, node: None }
    }

    /// Positions at the smallest key. A no-op on an empty map.
    pub fn begin(&mut self) {
        self.node = self.tree.root_link().map(|r| self.tree.leftmost(r));
    }

    /// Positions just past the largest key (the sentinel `prev()` descends from).
    pub fn end(&mut self) {
        self.node = None;
    }

    /// Positions at the first entry whose key is `>= key`, or at `end()` if none.
    pub fn lower_bound(&mut self, key: &[u8]) {
        let mut p = self.tree.root_link();
        let mut lower = None;
        while let Some(idx) = p {
            if self.tree.compare(self.tree.node_key(idx), key) != std::cmp::Ordering::Less {
                lower = Some(idx);
                p = self.tree.arena[idx as usize].left;
            } else {
                p = self.tree.arena[idx as usize].right;
            }
        }
        self.node = lower;
    }

    /// Positions at the last entry whose key is `<= key`, or at `end()` if none.
    pub fn upper_bound(&mut self, key: &[u8]) {
        let mut p = self.tree.root_link();
        let mut upper = None;
        while let Some(idx) = p {
            if self.tree.compare(self.tree.node_key(idx), key) != std::cmp::Ordering::Greater {
                upper = Some(idx);
                p = self.tree.arena[idx as usize].right;
            } else {
                p = self.tree.arena[idx as usize].left;
            }
        }
        self.node = upper;
    }

    /// Positions at `key` and reports whether an entry with that exact key exists.
    pub fn lookup(&mut self, key: &[u8]) -> bool {
        self.lower_bound(key);
        if let Some(idx) = self.node {
            if self.tree.compare(self.tree.node_key(idx), key) != std::cmp::Ordering::Equal {
                self.node = None;
            }
        }
        self.node.is_some()
    }

    /// Advances to the next entry. Returns `false` (a no-op) if already at `end()`.
    pub fn next(&mut self) -> bool {
        match self.node {
            None => false,
            Some(idx) => {
                self.node = self.tree.successor(idx);
                true
            }
        }
    }

    /// Steps back to the previous entry. Returns `false` at the very first entry, with
    /// the cursor left unmoved.
    pub fn prev(&mut self) -> bool {
        let leftmost = self.tree.root_link().map(|r| self.tree.leftmost(r));
        if self.node == leftmost {
            return false;
        }
        self.node = match self.node {
            None => self.tree.root_link().map(|r| self.tree.rightmost(r)),
            Some(idx) => self.tree.predecessor(idx),
        };
        true
    }

    /// The key at the current position, or `None` at `end()`.
    #[must_use]
    pub fn key(&self) -> Option<&Slice> {
        self.node.map(|idx| self.tree.node_key(idx))
    }

    /// The value at the current position, or `None` at `end()`.
    #[must_use]
    pub fn value(&self) -> Option<&Slice> {
        self.node.map(|idx| self.tree.node_val(idx))
    }
}
