//! Layer-wise K-way merge over the M-tree and C-tree layers of an LSM container.
//!
//! Precedence is defined purely by layer index: a smaller index is a newer layer, and wins
//! ties. This is also the iterator compaction uses, bounded to the two layers being merged,
//! which is why merge precedence and read precedence are the same rule.

use crate::comparator::Comparator;
use crate::error::{Error, Result};
use crate::memtable;
use crate::slice::Slice;
use std::sync::Arc;

/// The uniform, fallible cursor interface every layer (M-tree or C-tree) is adapted to so
/// the merge iterator can treat them identically.
pub(crate) trait SubIter {
    fn begin(&mut self) -> Result<()>;
    fn end(&mut self) -> Result<()>;
    fn lower_bound(&mut self, key: &[u8]) -> Result<()>;
    fn upper_bound(&mut self, key: &[u8]) -> Result<()>;
    fn next(&mut self) -> Result<bool>;
    fn prev(&mut self) -> Result<bool>;
    fn key(&self) -> Option<Slice>;
    fn value(&self) -> Option<Slice>;
}

impl<'a> SubIter for memtable::Cursor<'a> {
    fn begin(&mut self) -> Result<()> {
        memtable::Cursor::begin(self);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        memtable::Cursor::end(self);
        Ok(())
    }

    fn lower_bound(&mut self, key: &[u8]) -> Result<()> {
        memtable::Cursor::lower_bound(self, key);
        Ok(())
    }

    fn upper_bound(&mut self, key: &[u8]) -> Result<()> {
        memtable::Cursor::upper_bound(self, key);
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        Ok(memtable::Cursor::next(self))
    }

    fn prev(&mut self) -> Result<bool> {
        Ok(memtable::Cursor::prev(self))
    }

    fn key(&self) -> Option<Slice> {
        memtable::Cursor::key(self).cloned()
    }

    fn value(&self) -> Option<Slice> {
        memtable::Cursor::value(self).cloned()
    }
}

impl SubIter for crate::ctree::Cursor {
    fn begin(&mut self) -> Result<()> {
        crate::ctree::Cursor::begin(self)
    }

    fn end(&mut self) -> Result<()> {
        crate::ctree::Cursor::end(self)
    }

    fn lower_bound(&mut self, key: &[u8]) -> Result<()> {
        crate::ctree::Cursor::lower_bound(self, key)
    }

    fn upper_bound(&mut self, key: &[u8]) -> Result<()> {
        crate::ctree::Cursor::upper_bound(self, key)
    }

    fn next(&mut self) -> Result<bool> {
        crate::ctree::Cursor::next(self)
    }

    fn prev(&mut self) -> Result<bool> {
        crate::ctree::Cursor::prev(self)
    }

    fn key(&self) -> Option<Slice> {
        crate::ctree::Cursor::key(self)
    }

    fn value(&self) -> Option<Slice> {
        crate::ctree::Cursor::value(self)
    }
}

/// Merges `layers.len()` pre-positioned sub-iterators, ordered newest (index 0) to oldest.
pub struct MergeIter<'a> {
    layers: Vec<Box<dyn SubIter + 'a>>,
    cache: Vec<Option<(Slice, Slice)>>,
    cmp: Arc<dyn Comparator>,
    primary: Option<(usize, Slice, Slice)>,
    /// Set by `begin`/`end`/`lower_bound`/`upper_bound`. Distinguishes "positioned at
    /// `end()`" (primary unset, but `prev()` is valid and should walk backward from the
    /// last entry) from "never positioned at all" (primary also unset, but `prev()` has
    /// nothing to step back from and is a programming error).
    positioned: bool,
}

impl<'a> MergeIter<'a> {
    pub(crate) fn new(layers: Vec<Box<dyn SubIter + 'a>>, cmp: Arc<dyn Comparator>) -> Self {
        let cache = vec![None; layers.len()];
        Self {
            layers,
            cache,
            cmp,
            primary: None,
            positioned: false,
        }
    }

    fn refresh(&mut self, i: usize) {
        self.cache[i] = match (self.layers[i].key(), self.layers[i].value()) {
            (Some(k), Some(v)) => Some((k, v)),
            _ => None,
        };
    }

    fn refresh_all(&mut self) {
        for i in 0..self.layers.len() {
            self.refresh(i);
        }
    }

    fn adopt(&mut self, idx: Option<usize>) {
        self.primary = idx.map(|i| {
            let (k, v) = self.cache[i].clone().expect("selected layer must be non-empty");
            (i, k, v)
        });
    }

    /// Smallest cached key; ties broken toward the smaller (newer) layer index.
    fn select_min(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, slot) in self.cache.iter().enumerate() {
            let Some((k, _)) = slot else { continue };
            best = match best {
                None => Some(i),
                Some(b) => {
                    let (bk, _) = self.cache[b].as_ref().unwrap();
                    if self.cmp.compare(k, bk) == std::cmp::Ordering::Less {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best
    }

    /// Largest cached key strictly less than `bound`; ties broken toward the smaller
    /// (newer) layer index.
    fn select_max_below(&self, bound: &[u8]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, slot) in self.cache.iter().enumerate() {
            let Some((k, _)) = slot else { continue };
            if self.cmp.compare(k, bound) != std::cmp::Ordering::Less {
                continue;
            }
            best = match best {
                None => Some(i),
                Some(b) => {
                    let (bk, _) = self.cache[b].as_ref().unwrap();
                    if self.cmp.compare(k, bk) == std::cmp::Ordering::Greater {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best
    }

    /// Largest cached key, unbounded; ties broken toward the smaller (newer) layer index.
    /// The unbounded counterpart of `select_min`, used to pick the overall last entry when
    /// stepping backward from `end()`.
    fn select_max(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, slot) in self.cache.iter().enumerate() {
            let Some((k, _)) = slot else { continue };
            best = match best {
                None => Some(i),
                Some(b) => {
                    let (bk, _) = self.cache[b].as_ref().unwrap();
                    if self.cmp.compare(k, bk) == std::cmp::Ordering::Greater {
                        Some(i)
                    } else {
                        Some(b)
                    }
                }
            };
        }
        best
    }

    /// Positions every layer at its first entry and selects the overall smallest key.
    pub fn begin(&mut self) -> Result<()> {
        for l in &mut self.layers {
            l.begin()?;
        }
        self.refresh_all();
        let sel = self.select_min();
        self.adopt(sel);
        self.positioned = true;
        Ok(())
    }

    /// Positions every layer past its last entry.
    pub fn end(&mut self) -> Result<()> {
        for l in &mut self.layers {
            l.end()?;
        }
        self.refresh_all();
        self.primary = None;
        self.positioned = true;
        Ok(())
    }

    /// Positions at the smallest key `>= key` across every layer, or at `end()` if none.
    pub fn lower_bound(&mut self, key: &[u8]) -> Result<()> {
        for l in &mut self.layers {
            l.lower_bound(key)?;
        }
        self.refresh_all();
        let sel = self.select_min();
        self.adopt(sel);
        self.positioned = true;
        Ok(())
    }

    /// Positions at the smallest key `> key` across every layer, or at `end()` if none.
    pub fn upper_bound(&mut self, key: &[u8]) -> Result<()> {
        for l in &mut self.layers {
            l.upper_bound(key)?;
        }
        self.refresh_all();
        let sel = self.select_min();
        self.adopt(sel);
        self.positioned = true;
        Ok(())
    }

    /// Positions at `key`, reporting whether any layer holds that exact key (the winning
    /// layer's entry is what `key()`/`value()` then return).
    pub fn lookup(&mut self, key: &[u8]) -> Result<bool> {
        self.lower_bound(key)?;
        Ok(match &self.primary {
            Some((_, k, _)) => self.cmp.compare(k, key) == std::cmp::Ordering::Equal,
            None => false,
        })
    }

    /// Consumes shadowed duplicates in older layers and advances to the next key.
    /// Returns `false` (with the cursor left at `end()`) once nothing remains.
    pub fn next(&mut self) -> Result<bool> {
        let primary_key = match &self.primary {
            Some((_, k, _)) => k.clone(),
            None => return Ok(false),
        };

        for i in 0..self.layers.len() {
            let should_step = matches!(
                &self.cache[i],
                Some((k, _)) if self.cmp.compare(k, &primary_key) != std::cmp::Ordering::Greater
            );
            if should_step {
                self.layers[i].next()?;
                self.refresh(i);
            }
        }

        let sel = self.select_min();
        self.adopt(sel);
        Ok(self.primary.is_some())
    }

    /// Steps back to the previous key. From `end()` (primary unset, but the iterator has
    /// been positioned), steps every layer back and selects the overall largest key,
    /// mirroring how `begin()` selects the overall smallest with no prior primary.
    /// Calling this before any `begin`/`end`/`lower_bound`/`upper_bound` has ever run is a
    /// programming error and returns [`Error::NotFound`].
    pub fn prev(&mut self) -> Result<bool> {
        if !self.positioned {
            return Err(Error::NotFound);
        }

        let primary_key = match &self.primary {
            Some((_, k, _)) => Some(k.clone()),
            None => None,
        };

        match &primary_key {
            Some(primary_key) => {
                for i in 0..self.layers.len() {
                    let should_step = match &self.cache[i] {
                        Some((k, _)) => self.cmp.compare(k, primary_key) != std::cmp::Ordering::Less,
                        None => true,
                    };
                    if should_step {
                        self.layers[i].prev()?;
                        self.refresh(i);
                    }
                }
                let sel = self.select_max_below(primary_key);
                self.adopt(sel);
            }
            None => {
                for l in &mut self.layers {
                    l.prev()?;
                }
                self.refresh_all();
                let sel = self.select_max();
                self.adopt(sel);
            }
        }

        Ok(self.primary.is_some())
    }

    /// The current winning key, or `None` at `end()`.
    #[must_use]
    pub fn key(&self) -> Option<&Slice> {
        self.primary.as_ref().map(|(_, k, _)| k)
    }

    /// The current winning value, or `None` at `end()`.
    #[must_use]
    pub fn value(&self) -> Option<&Slice> {
        self.primary.as_ref().map(|(_, _, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::BytewiseComparator;

    /// A bare `Vec`-backed `SubIter`, standing in for a memtable or C-tree cursor so
    /// `MergeIter` can be exercised directly, without building a whole `Lsm`.
    struct VecIter {
        entries: Vec<(Slice, Slice)>,
        pos: Option<usize>,
    }

    impl VecIter {
        fn new(entries: &[(&str, &str)]) -> Self {
            Self {
                entries: entries.iter().map(|&(k, v)| (Slice::from(k), Slice::from(v))).collect(),
                pos: None,
            }
        }
    }

    impl SubIter for VecIter {
        fn begin(&mut self) -> Result<()> {
            self.pos = if self.entries.is_empty() { None } else { Some(0) };
            Ok(())
        }

        fn end(&mut self) -> Result<()> {
            self.pos = None;
            Ok(())
        }

        fn lower_bound(&mut self, key: &[u8]) -> Result<()> {
            self.pos = self.entries.iter().position(|(k, _)| k.as_ref() >= key);
            Ok(())
        }

        fn upper_bound(&mut self, key: &[u8]) -> Result<()> {
            self.pos = self.entries.iter().position(|(k, _)| k.as_ref() > key);
            Ok(())
        }

        fn next(&mut self) -> Result<bool> {
            match self.pos {
                Some(p) if p + 1 < self.entries.len() => {
                    self.pos = Some(p + 1);
                    Ok(true)
                }
                Some(_) => {
                    self.pos = None;
                    Ok(false)
                }
                None => Ok(false),
            }
        }

        fn prev(&mut self) -> Result<bool> {
            match self.pos {
                Some(0) => Ok(false),
                Some(p) => {
                    self.pos = Some(p - 1);
                    Ok(true)
                }
                None if self.entries.is_empty() => Ok(false),
                None => {
                    self.pos = Some(self.entries.len() - 1);
                    Ok(true)
                }
            }
        }

        fn key(&self) -> Option<Slice> {
            self.pos.map(|p| self.entries[p].0.clone())
        }

        fn value(&self) -> Option<Slice> {
            self.pos.map(|p| self.entries[p].1.clone())
        }
    }

    /// Two overlapping layers, newest first: `layer0` shadows `layer1`'s `"b"`.
    fn two_layers() -> MergeIter<'static> {
        let layer0 = VecIter::new(&[("b", "B0"), ("d", "D0")]);
        let layer1 = VecIter::new(&[("a", "A1"), ("b", "B1"), ("c", "C1")]);
        let layers: Vec<Box<dyn SubIter>> = vec![Box::new(layer0), Box::new(layer1)];
        MergeIter::new(layers, Arc::new(BytewiseComparator))
    }

    #[test]
    fn begin_and_next_walk_every_layer_in_order_with_newest_winning_ties() {
        let mut iter = two_layers();
        iter.begin().unwrap();

        let mut seen = Vec::new();
        while let Some(k) = iter.key() {
            seen.push((k.to_vec(), iter.value().unwrap().to_vec()));
            iter.next().unwrap();
        }
        assert_eq!(
            seen,
            vec![
                (b"a".to_vec(), b"A1".to_vec()),
                (b"b".to_vec(), b"B0".to_vec()),
                (b"c".to_vec(), b"C1".to_vec()),
                (b"d".to_vec(), b"D0".to_vec()),
            ]
        );
        assert!(iter.key().is_none());
    }

    #[test]
    fn end_then_prev_walks_backward_in_reverse_order() {
        let mut iter = two_layers();
        iter.end().unwrap();
        assert!(iter.key().is_none());

        let mut seen = Vec::new();
        while iter.prev().unwrap() {
            seen.push(iter.key().unwrap().to_vec());
        }
        assert_eq!(seen, vec![b"d".to_vec(), b"c".to_vec(), b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn prev_before_any_positioning_is_an_error() {
        let mut iter = two_layers();
        assert!(matches!(iter.prev(), Err(Error::NotFound)));
    }

    #[test]
    fn lower_bound_lands_on_an_exact_match() {
        let mut iter = two_layers();
        iter.lower_bound(b"b").unwrap();
        assert_eq!(iter.key().unwrap().as_ref(), b"b".as_slice());
        assert_eq!(iter.value().unwrap().as_ref(), b"B0".as_slice());
    }

    #[test]
    fn upper_bound_skips_an_exact_match() {
        let mut iter = two_layers();
        iter.upper_bound(b"b").unwrap();
        assert_eq!(iter.key().unwrap().as_ref(), b"c".as_slice());
    }

    #[test]
    fn lookup_reports_presence_and_absence() {
        let mut iter = two_layers();
        assert!(iter.lookup(b"c").unwrap());
        assert_eq!(iter.value().unwrap().as_ref(), b"C1".as_slice());
        assert!(!iter.lookup(b"z").unwrap());
        assert!(iter.key().is_none());
    }
}
