//! # Chunk Arena
//!
//! A growable buffer of fixed-stride records carved into per-item chunks.
//!
//! Holders keep *offsets* (slot indices), never references. Any call that can
//! move data (growth of an open item, compaction, shrinking) bumps
//! [`ChunkArena::generation`] and logs the item's new offset. The `_with`
//! variants of those calls write the new offsets straight back into the
//! holders (see the `relocation` module); [`ChunkArena::sync`] re-reads one
//! holder on demand.
//!
//! The free chunks and the reserved chunks always tile `[0, capacity)` exactly.

use std::cmp::Ordering;

use tracing::{debug, error, trace, warn};

use super::chunk::{ChunkHolder, ChunkTable, ItemId, ReservedChunk};
use super::free_list::{FreeChunk, FreeList};
use super::relocation::RelocationLog;
use super::stats::ArenaStats;
use crate::config::ArenaConfig;
use crate::error::{ArenaError, ArenaResult, ProtocolMisuse};

/// The item currently being written through `start_item`/`append`/`end_item`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct OpenItem {
    pub(super) item: ItemId,
    /// Records written so far.
    pub(super) cursor: usize,
}

/// Growable arena of fixed-size records with best-fit chunk allocation.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Use one arena per owning context or wrap it
/// in a mutex.
///
/// # Example
///
/// ```rust
/// use tessera_core::{ChunkArena, ItemId};
///
/// let mut arena: ChunkArena<u32> = ChunkArena::new(0);
/// let item = ItemId::new(1);
///
/// arena.start_item(item)?;
/// arena.append(item, &[1, 2, 3, 4, 5])?;
/// arena.end_item(item)?;
///
/// assert_eq!(arena.records_for(item), Some(&[1, 2, 3, 4, 5][..]));
/// # Ok::<(), tessera_core::ArenaError>(())
/// ```
pub struct ChunkArena<R> {
    /// Backing storage; `buffer.len()` is the capacity.
    pub(super) buffer: Vec<R>,
    /// Unused space.
    pub(super) free: FreeList,
    /// Space owned by items.
    pub(super) reserved: ChunkTable,
    /// Incremental write in progress, if any.
    pub(super) open: Option<OpenItem>,
    /// Construction and growth parameters.
    pub(super) config: ArenaConfig,
    /// Sticky allocation-failure latch.
    pub(super) failed: bool,
    /// Bumped whenever existing data moves.
    pub(super) generation: u64,
    /// New offsets of moved items, awaiting delivery to holders.
    pub(super) relocations: RelocationLog,
    pub(super) resizes: u64,
    pub(super) defragmentations: u64,
}

impl<R: Copy + Default> ChunkArena<R> {
    /// Creates an arena with `initial_capacity` slots and default settings.
    ///
    /// # Arguments
    ///
    /// * `initial_capacity` - Slots to allocate up front (may be zero)
    #[must_use]
    pub fn new(initial_capacity: usize) -> Self {
        Self::with_config(ArenaConfig::default().with_initial_capacity(initial_capacity))
    }

    /// Creates an arena from a configuration.
    ///
    /// If the initial buffer cannot be obtained the arena comes back empty and
    /// already failed; check [`ChunkArena::is_failed`].
    #[must_use]
    pub fn with_config(config: ArenaConfig) -> Self {
        let mut arena = Self {
            buffer: Vec::new(),
            free: FreeList::new(),
            reserved: ChunkTable::new(),
            open: None,
            config,
            failed: false,
            generation: 0,
            relocations: RelocationLog::new(),
            resizes: 0,
            defragmentations: 0,
        };

        let capacity = config.initial_capacity;
        let over_limit = config.max_capacity.is_some_and(|max| capacity > max);
        if over_limit || arena.buffer.try_reserve_exact(capacity).is_err() {
            arena.fail(capacity);
            return arena;
        }
        arena.buffer.resize(capacity, R::default());
        arena.free.insert(0, capacity);
        arena
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Total slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Slots not owned by any item.
    #[inline]
    #[must_use]
    pub fn free_space(&self) -> usize {
        self.free.total()
    }

    /// Slots owned by items.
    #[inline]
    #[must_use]
    pub fn reserved_space(&self) -> usize {
        self.reserved.total()
    }

    /// Number of items owning a chunk.
    #[inline]
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.reserved.len()
    }

    /// True once an allocation failure has latched.
    #[inline]
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.failed
    }

    /// The item currently being written, if any.
    #[inline]
    #[must_use]
    pub fn open_item(&self) -> Option<ItemId> {
        self.open.map(|open| open.item)
    }

    /// Relocation counter. Changes whenever existing data moves.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Active configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// True if `item` owns a chunk.
    #[inline]
    #[must_use]
    pub fn contains(&self, item: ItemId) -> bool {
        self.reserved.contains(item)
    }

    /// Current offset of `item`'s records.
    #[must_use]
    pub fn offset_of(&self, item: ItemId) -> Option<usize> {
        self.reserved.get(item).map(|chunk| chunk.offset)
    }

    /// Number of readable records for `item` (the written prefix if it is open).
    #[must_use]
    pub fn size_of(&self, item: ItemId) -> Option<usize> {
        self.reserved.get(item).map(|chunk| self.visible_len(&chunk))
    }

    /// The raw chunk owned by `item`, including speculative space of an open item.
    #[must_use]
    pub fn chunk_of(&self, item: ItemId) -> Option<ReservedChunk> {
        self.reserved.get(item)
    }

    /// All reserved chunks, in no particular order.
    pub fn items(&self) -> impl Iterator<Item = ReservedChunk> + '_ {
        self.reserved.iter().copied()
    }

    /// All free chunks in offset order.
    pub fn free_chunks(&self) -> impl Iterator<Item = FreeChunk> + '_ {
        self.free.iter()
    }

    /// `len` records starting at `offset`.
    ///
    /// Valid only until the next mutating call.
    #[must_use]
    pub fn records_at(&self, offset: usize, len: usize) -> Option<&[R]> {
        let end = offset.checked_add(len)?;
        self.buffer.get(offset..end)
    }

    /// Records owned by `item`.
    ///
    /// Valid only until the next mutating call.
    #[must_use]
    pub fn records_for(&self, item: ItemId) -> Option<&[R]> {
        let chunk = self.reserved.get(item)?;
        let len = self.visible_len(&chunk);
        self.buffer.get(chunk.offset..chunk.offset + len)
    }

    /// Mutable records owned by `item`, for in-place edits that keep the count.
    pub fn records_for_mut(&mut self, item: ItemId) -> Option<&mut [R]> {
        let chunk = self.reserved.get(item)?;
        let len = self.visible_len(&chunk);
        self.buffer.get_mut(chunk.offset..chunk.offset + len)
    }

    /// The whole buffer, free slots included.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[R] {
        &self.buffer
    }

    /// Writes the arena's view of a holder's offset and size back into it.
    ///
    /// # Errors
    ///
    /// [`ArenaError::UnknownItem`] if the holder owns no chunk.
    pub fn sync<H: ChunkHolder>(&self, holder: &mut H) -> ArenaResult<()> {
        let item = holder.item_id();
        let chunk = self.reserved.get(item).ok_or(ArenaError::UnknownItem(item))?;
        holder.set_offset(chunk.offset);
        holder.set_size(self.visible_len(&chunk));
        Ok(())
    }

    /// Occupancy snapshot.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            capacity: self.capacity(),
            free_slots: self.free.total(),
            reserved_slots: self.reserved.total(),
            free_chunks: self.free.len(),
            largest_free_chunk: self.free.largest(),
            items: self.reserved.len(),
            resizes: self.resizes,
            defragmentations: self.defragmentations,
            generation: self.generation,
        }
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    /// Reserves `size` contiguous slots for `item` and returns their offset.
    ///
    /// Grows the arena when free space is short and compacts it when free
    /// space is sufficient but fragmented. Existing items may move.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::Failed`] if the arena already failed
    /// - [`ProtocolMisuse::AlreadyAllocated`] if `item` owns a chunk
    /// - [`ArenaError::AllocationFailure`] if growth is impossible (latches)
    pub fn allocate(&mut self, item: ItemId, size: usize) -> ArenaResult<usize> {
        self.ensure_live()?;
        if self.reserved.contains(item) {
            return Err(ProtocolMisuse::AlreadyAllocated(item).into());
        }
        self.allocate_chunk(item, size)
    }

    /// Releases `item`'s chunk back to free space.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::Failed`] if the arena already failed
    /// - [`ProtocolMisuse::ItemInProgress`] if `item` is open
    /// - [`ArenaError::UnknownItem`] if `item` owns nothing
    pub fn free(&mut self, item: ItemId) -> ArenaResult<()> {
        self.ensure_live()?;
        if self.open_item() == Some(item) {
            return Err(ProtocolMisuse::ItemInProgress(item).into());
        }
        let chunk = self.reserved.remove(item).ok_or(ArenaError::UnknownItem(item))?;
        self.free.release(chunk.offset, chunk.size);
        self.relocations.forget(item);
        trace!(item = item.raw(), offset = chunk.offset, size = chunk.size, "chunk freed");
        Ok(())
    }

    /// Drops every item. The buffer keeps its capacity.
    ///
    /// # Errors
    ///
    /// [`ArenaError::Failed`] if the arena already failed.
    pub fn clear(&mut self) -> ArenaResult<()> {
        self.ensure_live()?;
        self.reserved.clear();
        self.relocations.clear();
        self.open = None;
        self.free = FreeList::spanning(0, self.capacity());
        self.generation += 1;
        Ok(())
    }

    /// Grows or shrinks the buffer to `new_capacity` slots.
    ///
    /// Growing keeps every offset. Shrinking compacts live data into a fresh
    /// buffer and is refused if the live data would not fit.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::Failed`] if the arena already failed
    /// - [`ArenaError::ShrinkRejected`] if live data exceeds `new_capacity` (state unchanged)
    /// - [`ArenaError::AllocationFailure`] if memory cannot be obtained (latches)
    pub fn resize(&mut self, new_capacity: usize) -> ArenaResult<()> {
        self.ensure_live()?;
        match new_capacity.cmp(&self.capacity()) {
            Ordering::Equal => Ok(()),
            Ordering::Greater => self.grow_to(new_capacity),
            Ordering::Less => self.shrink_to(new_capacity),
        }
    }

    /// Checks every bookkeeping invariant.
    ///
    /// # Errors
    ///
    /// [`ArenaError::Corrupted`] describing the first violation found.
    pub fn validate(&self) -> ArenaResult<()> {
        let capacity = self.capacity();
        if !self.reserved.is_consistent() {
            return Err(ArenaError::Corrupted("reserved index out of sync".to_string()));
        }
        if !self.free.is_consistent() {
            return Err(ArenaError::Corrupted("free index out of sync".to_string()));
        }
        if self.free.total() + self.reserved.total() != capacity {
            return Err(ArenaError::Corrupted(format!(
                "free {} + reserved {} != capacity {capacity}",
                self.free.total(),
                self.reserved.total()
            )));
        }

        let mut ranges: Vec<(usize, usize)> = self
            .free
            .iter()
            .map(|chunk| (chunk.offset, chunk.end()))
            .chain(
                self.reserved
                    .iter()
                    .filter(|chunk| chunk.size > 0)
                    .map(|chunk| (chunk.offset, chunk.end())),
            )
            .collect();
        ranges.sort_unstable();

        let mut next = 0;
        for (start, end) in ranges {
            match start.cmp(&next) {
                Ordering::Less => {
                    return Err(ArenaError::Corrupted(format!("overlap at slot {start}")));
                }
                Ordering::Greater => {
                    return Err(ArenaError::Corrupted(format!("gap at slots {next}..{start}")));
                }
                Ordering::Equal => next = end,
            }
        }
        if next != capacity {
            return Err(ArenaError::Corrupted(format!(
                "chunks end at {next}, capacity is {capacity}"
            )));
        }

        if let Some(open) = self.open {
            let chunk = self.reserved.get(open.item).ok_or_else(|| {
                ArenaError::Corrupted(format!("open item {} owns no chunk", open.item))
            })?;
            if open.cursor > chunk.size {
                return Err(ArenaError::Corrupted(format!(
                    "open item {} wrote {} records into {} slots",
                    open.item, open.cursor, chunk.size
                )));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    pub(super) fn ensure_live(&self) -> ArenaResult<()> {
        if self.failed {
            Err(ArenaError::Failed)
        } else {
            Ok(())
        }
    }

    /// Latches the failed state and returns the error describing it.
    pub(super) fn fail(&mut self, requested: usize) -> ArenaError {
        self.failed = true;
        let err = ArenaError::AllocationFailure {
            requested,
            capacity: self.capacity(),
            limit: self.config.max_capacity,
        };
        error!(requested, capacity = self.capacity(), "arena allocation failed: {}", err);
        err
    }

    /// Records visible to readers: everything, or the written prefix while open.
    pub(super) fn visible_len(&self, chunk: &ReservedChunk) -> usize {
        match self.open {
            Some(open) if open.item == chunk.item => open.cursor,
            _ => chunk.size,
        }
    }

    /// Reserves and registers a chunk for an item that owns none.
    pub(super) fn allocate_chunk(&mut self, item: ItemId, size: usize) -> ArenaResult<usize> {
        let offset = if size == 0 { 0 } else { self.reserve_slots(size)? };
        self.reserved.insert(ReservedChunk { item, offset, size });
        trace!(item = item.raw(), offset, size, "chunk allocated");
        Ok(offset)
    }

    /// Takes `size` slots out of free space without registering an owner.
    ///
    /// The caller must register or release the returned range before returning.
    pub(super) fn reserve_slots(&mut self, size: usize) -> ArenaResult<usize> {
        if self.free.total() < size {
            self.grow_for(size)?;
        }
        let chunk = if let Some(chunk) = self.free.best_fit(size) {
            chunk
        } else {
            self.compact_in_place();
            self.free.best_fit(size).ok_or_else(|| {
                ArenaError::Corrupted(format!("no chunk of {size} slots after compaction"))
            })?
        };
        Ok(self.free.split(chunk, size))
    }

    /// Grows so that `size` more slots fit.
    ///
    /// Doubles the capacity when that is enough, otherwise jumps to the next
    /// power of two of `capacity + size`. Clamped to `max_capacity` when the
    /// clamp still fits the request.
    fn grow_for(&mut self, size: usize) -> ArenaResult<()> {
        let capacity = self.capacity();
        let Some(required) = self.reserved.total().checked_add(size) else {
            return Err(self.fail(usize::MAX));
        };
        let mut target = growth_target(capacity, size, required).unwrap_or(required);
        if let Some(max) = self.config.max_capacity {
            if target > max && required <= max {
                target = max;
            }
        }
        self.grow_to(target)
    }

    fn grow_to(&mut self, new_capacity: usize) -> ArenaResult<()> {
        let capacity = self.capacity();
        if self.config.max_capacity.is_some_and(|max| new_capacity > max) {
            return Err(self.fail(new_capacity));
        }
        if self.buffer.try_reserve_exact(new_capacity - capacity).is_err() {
            return Err(self.fail(new_capacity));
        }
        self.buffer.resize(new_capacity, R::default());

        let extra = new_capacity - capacity;
        match self.free.last() {
            Some(last) if last.end() == capacity => self.free.extend(last.offset, extra),
            _ => self.free.insert(capacity, extra),
        }
        self.resizes += 1;
        debug!(from = capacity, to = new_capacity, "arena grown");
        Ok(())
    }

    fn shrink_to(&mut self, new_capacity: usize) -> ArenaResult<()> {
        let live = self.reserved.total();
        if live > new_capacity {
            warn!(requested = new_capacity, live, "shrink rejected");
            return Err(ArenaError::ShrinkRejected {
                requested: new_capacity,
                live,
            });
        }
        let mut target = Vec::new();
        if target.try_reserve_exact(new_capacity).is_err() {
            return Err(self.fail(new_capacity));
        }
        let capacity = self.capacity();
        self.compact_into(target, new_capacity);
        self.resizes += 1;
        debug!(from = capacity, to = new_capacity, "arena shrunk");
        Ok(())
    }
}

impl<R: bytemuck::Pod> ChunkArena<R> {
    /// The whole buffer as bytes, ready for upload.
    ///
    /// Item `x` occupies bytes `offset_of(x) * size_of::<R>()` onwards.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.buffer)
    }
}

/// Capacity to grow to so that `required` slots are reserved in total.
fn growth_target(capacity: usize, size: usize, required: usize) -> Option<usize> {
    let doubled = capacity.checked_mul(2)?;
    if doubled >= required {
        Some(doubled)
    } else {
        capacity.checked_add(size)?.checked_next_power_of_two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> ItemId {
        ItemId::new(raw)
    }

    #[test]
    fn test_new_arena_is_one_free_chunk() {
        let arena: ChunkArena<u32> = ChunkArena::new(64);
        assert_eq!(arena.capacity(), 64);
        assert_eq!(arena.free_space(), 64);
        assert_eq!(arena.free_chunks().count(), 1);
        assert!(arena.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_grows_on_first_use() {
        let mut arena: ChunkArena<u32> = ChunkArena::new(0);
        assert_eq!(arena.free_chunks().count(), 0);

        let offset = arena.allocate(id(1), 5).unwrap();
        assert_eq!(offset, 0);
        assert_eq!(arena.capacity(), 8);
        assert_eq!(arena.stats().resizes, 1);
        assert!(arena.validate().is_ok());
    }

    #[test]
    fn test_allocate_best_fit() {
        let mut arena: ChunkArena<u32> = ChunkArena::new(40);
        arena.allocate(id(1), 10).unwrap();
        arena.allocate(id(2), 4).unwrap();
        arena.allocate(id(3), 10).unwrap();
        arena.allocate(id(4), 6).unwrap();
        arena.free(id(1)).unwrap();
        arena.free(id(3)).unwrap();
        // Free: [0,10), [14,24), [30,40)

        assert_eq!(arena.allocate(id(5), 9).unwrap(), 0);
        assert_eq!(arena.allocate(id(6), 10).unwrap(), 14);
        assert!(arena.validate().is_ok());
    }

    #[test]
    fn test_allocate_twice_is_misuse() {
        let mut arena: ChunkArena<u32> = ChunkArena::new(16);
        arena.allocate(id(1), 4).unwrap();
        let err = arena.allocate(id(1), 4).unwrap_err();
        assert_eq!(err, ProtocolMisuse::AlreadyAllocated(id(1)).into());
        assert!(!arena.is_failed());
    }

    #[test]
    fn test_free_coalesces() {
        let mut arena: ChunkArena<u32> = ChunkArena::new(30);
        arena.allocate(id(1), 10).unwrap();
        arena.allocate(id(2), 10).unwrap();
        arena.allocate(id(3), 10).unwrap();
        arena.free(id(1)).unwrap();
        arena.free(id(3)).unwrap();
        assert_eq!(arena.free_chunks().count(), 2);

        arena.free(id(2)).unwrap();
        assert_eq!(arena.free_chunks().count(), 1);
        assert_eq!(arena.free_space(), 30);
    }

    #[test]
    fn test_free_unknown_item() {
        let mut arena: ChunkArena<u32> = ChunkArena::new(8);
        assert_eq!(arena.free(id(9)), Err(ArenaError::UnknownItem(id(9))));
    }

    #[test]
    fn test_grow_extends_trailing_free_chunk() {
        let mut arena: ChunkArena<u32> = ChunkArena::new(16);
        arena.allocate(id(1), 8).unwrap();
        arena.resize(32).unwrap();
        let free: Vec<_> = arena.free_chunks().collect();
        assert_eq!(free, vec![FreeChunk { size: 24, offset: 8 }]);
    }

    #[test]
    fn test_grow_appends_new_chunk_when_full() {
        let mut arena: ChunkArena<u32> = ChunkArena::new(8);
        arena.allocate(id(1), 8).unwrap();
        arena.resize(12).unwrap();
        let free: Vec<_> = arena.free_chunks().collect();
        assert_eq!(free, vec![FreeChunk { size: 4, offset: 8 }]);
        assert_eq!(arena.offset_of(id(1)), Some(0));
    }

    #[test]
    fn test_growth_target_policy() {
        assert_eq!(growth_target(0, 3, 3), Some(4));
        assert_eq!(growth_target(16, 4, 20), Some(32));
        assert_eq!(growth_target(16, 40, 50), Some(64));
        assert_eq!(growth_target(usize::MAX, 1, 1), None);
    }

    #[test]
    fn test_growth_clamped_to_max() {
        let config = ArenaConfig::default()
            .with_initial_capacity(16)
            .with_max_capacity(20);
        let mut arena: ChunkArena<u32> = ChunkArena::with_config(config);
        arena.allocate(id(1), 16).unwrap();
        arena.allocate(id(2), 4).unwrap();
        assert_eq!(arena.capacity(), 20);
        assert!(!arena.is_failed());
    }

    #[test]
    fn test_initial_capacity_over_limit_fails() {
        let config = ArenaConfig {
            initial_capacity: 64,
            min_reserve: 3,
            max_capacity: Some(8),
        };
        let arena: ChunkArena<u32> = ChunkArena::with_config(config);
        assert!(arena.is_failed());
        assert_eq!(arena.capacity(), 0);
    }

    #[test]
    fn test_sync_holder() {
        struct Holder {
            id: ItemId,
            offset: usize,
            size: usize,
        }
        impl ChunkHolder for Holder {
            fn item_id(&self) -> ItemId {
                self.id
            }
            fn offset(&self) -> usize {
                self.offset
            }
            fn set_offset(&mut self, offset: usize) {
                self.offset = offset;
            }
            fn size(&self) -> usize {
                self.size
            }
            fn set_size(&mut self, size: usize) {
                self.size = size;
            }
        }

        let mut arena: ChunkArena<u32> = ChunkArena::new(16);
        arena.allocate(id(1), 4).unwrap();
        arena.allocate(id(2), 6).unwrap();

        let mut holder = Holder {
            id: id(2),
            offset: usize::MAX,
            size: 0,
        };
        arena.sync(&mut holder).unwrap();
        assert_eq!((holder.offset(), holder.size()), (4, 6));
    }

    #[test]
    fn test_records_at_bounds() {
        let arena: ChunkArena<u32> = ChunkArena::new(8);
        assert_eq!(arena.records_at(4, 4).map(<[u32]>::len), Some(4));
        assert!(arena.records_at(6, 4).is_none());
        assert!(arena.records_at(usize::MAX, 2).is_none());
    }

    #[test]
    fn test_as_bytes_covers_buffer() {
        let mut arena: ChunkArena<u32> = ChunkArena::new(4);
        arena.allocate(id(1), 1).unwrap();
        arena.records_for_mut(id(1)).unwrap()[0] = 0x0102_0304;
        assert_eq!(arena.as_bytes().len(), 16);
        assert_eq!(&arena.as_bytes()[..4], &0x0102_0304u32.to_ne_bytes());
    }

    #[test]
    fn test_clear_resets_bookkeeping() {
        let mut arena: ChunkArena<u32> = ChunkArena::new(16);
        arena.allocate(id(1), 4).unwrap();
        arena.allocate(id(2), 4).unwrap();
        arena.clear().unwrap();
        assert_eq!(arena.item_count(), 0);
        assert_eq!(arena.free_space(), 16);
        assert!(arena.validate().is_ok());
    }
}
