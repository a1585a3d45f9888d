//! # Reserved Chunks
//!
//! Items are lightweight identifiers. The arena never looks inside them; it
//! only maps each [`ItemId`] to the one chunk of slots it currently owns.
//!
//! The table is a dense `Vec` plus a `HashMap` index, so item identity never
//! depends on an address and removal is O(1) via `swap_remove`.

use std::collections::HashMap;
use std::fmt;

/// Stable, caller-chosen identity of an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ItemId(u64);

impl ItemId {
    /// Creates an item ID from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A contiguous run of slots owned by one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReservedChunk {
    /// Owner of the slots.
    pub item: ItemId,
    /// First slot.
    pub offset: usize,
    /// Number of slots.
    pub size: usize,
}

impl ReservedChunk {
    /// One past the last slot.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Minimal capability the arena needs from a caller-side item object.
///
/// Holders cache where their records live. Calls that move data write the new
/// offset back through [`ChunkHolder::set_offset`] when given the holders (see
/// [`RelocationSink`](crate::RelocationSink)); [`ChunkArena::sync`](crate::ChunkArena::sync)
/// refreshes a single holder on demand.
pub trait ChunkHolder {
    /// The arena key of this holder.
    fn item_id(&self) -> ItemId;

    /// Cached offset of the holder's records.
    fn offset(&self) -> usize;

    /// Stores a new offset.
    fn set_offset(&mut self, offset: usize);

    /// Cached number of records.
    fn size(&self) -> usize;

    /// Stores a new record count.
    fn set_size(&mut self, size: usize);
}

/// Reserved chunks keyed by item.
#[derive(Debug, Default, Clone)]
pub(crate) struct ChunkTable {
    chunks: Vec<ReservedChunk>,
    index: HashMap<ItemId, usize>,
    total: usize,
}

impl ChunkTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Builds a table from chunks that are already known to be disjoint.
    pub(crate) fn from_chunks(chunks: Vec<ReservedChunk>) -> Self {
        let index = chunks
            .iter()
            .enumerate()
            .map(|(slot, chunk)| (chunk.item, slot))
            .collect();
        let total = chunks.iter().map(|chunk| chunk.size).sum();
        Self {
            chunks,
            index,
            total,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Sum of all reserved sizes.
    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub(crate) fn contains(&self, item: ItemId) -> bool {
        self.index.contains_key(&item)
    }

    #[inline]
    pub(crate) fn get(&self, item: ItemId) -> Option<ReservedChunk> {
        self.index.get(&item).map(|&slot| self.chunks[slot])
    }

    /// Registers a new chunk. The item must not own one already.
    pub(crate) fn insert(&mut self, chunk: ReservedChunk) {
        debug_assert!(!self.contains(chunk.item), "item {} inserted twice", chunk.item);
        self.index.insert(chunk.item, self.chunks.len());
        self.total += chunk.size;
        self.chunks.push(chunk);
    }

    /// Moves and/or resizes an existing chunk. Returns false for unknown items.
    pub(crate) fn update(&mut self, item: ItemId, offset: usize, size: usize) -> bool {
        let Some(&slot) = self.index.get(&item) else {
            return false;
        };
        let chunk = &mut self.chunks[slot];
        self.total = self.total - chunk.size + size;
        chunk.offset = offset;
        chunk.size = size;
        true
    }

    pub(crate) fn remove(&mut self, item: ItemId) -> Option<ReservedChunk> {
        let slot = self.index.remove(&item)?;
        let chunk = self.chunks.swap_remove(slot);
        if let Some(moved) = self.chunks.get(slot) {
            self.index.insert(moved.item, slot);
        }
        self.total -= chunk.size;
        Some(chunk)
    }

    pub(crate) fn clear(&mut self) {
        self.chunks.clear();
        self.index.clear();
        self.total = 0;
    }

    #[inline]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &ReservedChunk> {
        self.chunks.iter()
    }

    /// Copy of all chunks ordered by offset (ties by item for a stable order).
    pub(crate) fn sorted_by_offset(&self) -> Vec<ReservedChunk> {
        let mut sorted = self.chunks.clone();
        sorted.sort_unstable_by_key(|chunk| (chunk.offset, chunk.item));
        sorted
    }

    /// Checks that the index and the dense table agree.
    pub(crate) fn is_consistent(&self) -> bool {
        self.index.len() == self.chunks.len()
            && self
                .index
                .iter()
                .all(|(item, &slot)| self.chunks.get(slot).is_some_and(|c| c.item == *item))
            && self.total == self.chunks.iter().map(|c| c.size).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(item: u64, offset: usize, size: usize) -> ReservedChunk {
        ReservedChunk {
            item: ItemId::new(item),
            offset,
            size,
        }
    }

    #[test]
    fn test_item_id_display() {
        assert_eq!(ItemId::new(17).to_string(), "#17");
        assert_eq!(ItemId::from(3).raw(), 3);
    }

    #[test]
    fn test_table_remove_keeps_index() {
        let mut table = ChunkTable::new();
        table.insert(chunk(1, 0, 4));
        table.insert(chunk(2, 4, 6));
        table.insert(chunk(3, 10, 2));
        assert_eq!(table.total(), 12);

        let removed = table.remove(ItemId::new(1)).unwrap();
        assert_eq!(removed.size, 4);
        assert_eq!(table.total(), 8);
        assert!(table.is_consistent());
        assert_eq!(table.get(ItemId::new(3)).unwrap().offset, 10);
        assert!(table.get(ItemId::new(1)).is_none());
    }

    #[test]
    fn test_table_update_tracks_total() {
        let mut table = ChunkTable::new();
        table.insert(chunk(9, 0, 8));
        assert!(table.update(ItemId::new(9), 16, 3));
        assert_eq!(table.total(), 3);
        assert_eq!(table.get(ItemId::new(9)).unwrap().end(), 19);
        assert!(!table.update(ItemId::new(10), 0, 1));
    }

    #[test]
    fn test_sorted_by_offset() {
        let table = ChunkTable::from_chunks(vec![chunk(1, 20, 5), chunk(2, 0, 5), chunk(3, 10, 5)]);
        let offsets: Vec<_> = table.sorted_by_offset().iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 10, 20]);
        assert!(table.is_consistent());
    }
}
