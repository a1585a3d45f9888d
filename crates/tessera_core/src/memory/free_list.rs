//! # Free-Chunk Index
//!
//! Unused buffer space, indexed two ways:
//! - by `(size, offset)` for best-fit lookup ("smallest chunk >= n, lowest offset first")
//! - by `offset` for coalescing with neighbours and finding the physically last chunk
//!
//! Both indices always describe the same set of chunks. Empty chunks are never stored.

use std::collections::{BTreeMap, BTreeSet};

/// A run of unused slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FreeChunk {
    /// Number of slots.
    pub size: usize,
    /// First slot.
    pub offset: usize,
}

impl FreeChunk {
    /// One past the last slot.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Set of free chunks with best-fit queries.
#[derive(Debug, Default, Clone)]
pub(crate) struct FreeList {
    by_size: BTreeSet<(usize, usize)>,
    by_offset: BTreeMap<usize, usize>,
    total: usize,
}

impl FreeList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A free list holding one chunk `[offset, offset + size)` (or nothing if empty).
    pub(crate) fn spanning(offset: usize, size: usize) -> Self {
        let mut list = Self::new();
        list.insert(offset, size);
        list
    }

    /// Total free slots.
    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.total
    }

    /// Number of free chunks.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.by_offset.len()
    }

    /// Largest single free chunk.
    pub(crate) fn largest(&self) -> usize {
        self.by_size.last().map_or(0, |&(size, _)| size)
    }

    /// The chunk with the highest offset.
    pub(crate) fn last(&self) -> Option<FreeChunk> {
        self.by_offset
            .last_key_value()
            .map(|(&offset, &size)| FreeChunk { size, offset })
    }

    /// Smallest chunk that can hold `size` slots.
    pub(crate) fn best_fit(&self, size: usize) -> Option<FreeChunk> {
        self.by_size
            .range((size, 0)..)
            .next()
            .map(|&(size, offset)| FreeChunk { size, offset })
    }

    /// Inserts a chunk without merging. No-op for empty chunks.
    pub(crate) fn insert(&mut self, offset: usize, size: usize) {
        if size == 0 {
            return;
        }
        self.by_size.insert((size, offset));
        self.by_offset.insert(offset, size);
        self.total += size;
    }

    /// Removes the chunk starting at `offset`.
    pub(crate) fn remove(&mut self, offset: usize) -> Option<FreeChunk> {
        let size = self.by_offset.remove(&offset)?;
        self.by_size.remove(&(size, offset));
        self.total -= size;
        Some(FreeChunk { size, offset })
    }

    /// Takes `size` slots from the front of `chunk`, returning the rest to the list.
    pub(crate) fn split(&mut self, chunk: FreeChunk, size: usize) -> usize {
        debug_assert!(chunk.size >= size);
        self.remove(chunk.offset);
        self.insert(chunk.offset + size, chunk.size - size);
        chunk.offset
    }

    /// Returns `[offset, offset + size)` to the list, merging with adjacent chunks.
    pub(crate) fn release(&mut self, offset: usize, size: usize) {
        if size == 0 {
            return;
        }
        let mut start = offset;
        let mut len = size;

        if let Some((&prev_offset, &prev_size)) = self.by_offset.range(..offset).next_back() {
            if prev_offset + prev_size == offset {
                self.remove(prev_offset);
                start = prev_offset;
                len += prev_size;
            }
        }
        let end = offset + size;
        if let Some(&next_size) = self.by_offset.get(&end) {
            self.remove(end);
            len += next_size;
        }

        self.insert(start, len);
    }

    /// Grows the chunk at `offset` by `extra` slots.
    pub(crate) fn extend(&mut self, offset: usize, extra: usize) {
        if let Some(chunk) = self.remove(offset) {
            self.insert(offset, chunk.size + extra);
        }
    }

    /// Chunks in offset order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = FreeChunk> + '_ {
        self.by_offset
            .iter()
            .map(|(&offset, &size)| FreeChunk { size, offset })
    }

    /// Checks that both indices agree.
    pub(crate) fn is_consistent(&self) -> bool {
        self.by_size.len() == self.by_offset.len()
            && self
                .by_offset
                .iter()
                .all(|(&offset, &size)| size > 0 && self.by_size.contains(&(size, offset)))
            && self.total == self.by_offset.values().sum::<usize>()
    }
}
