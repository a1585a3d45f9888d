//! # Relocation Write-Back
//!
//! Whenever the arena moves an item's records it notes the item's new offset.
//! The notes are handed to a [`RelocationSink`], which writes them into the
//! caller-side holders, so a holder's `offset()` matches the arena without
//! the holder ever asking.
//!
//! ```text
//! allocate_with / start_item_with / append_with / resize_with / defragment_with
//!        │ moves data, logs (item → new offset)
//!        ▼
//! deliver_relocations(sink) ──► sink.relocated(item, offset) ──► holder.set_offset
//! ```
//!
//! Notes are coalesced per item: only the latest offset is delivered.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use tracing::trace;

use super::arena::ChunkArena;
use super::chunk::{ChunkHolder, ItemId};
use crate::error::ArenaResult;

/// An item's records moved to `offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    /// The moved item.
    pub item: ItemId,
    /// Where its records start now.
    pub offset: usize,
}

/// Receiver of relocation notices, typically the collection of holders.
pub trait RelocationSink {
    /// `item`'s records now start at `offset`.
    fn relocated(&mut self, item: ItemId, offset: usize);
}

impl<H: ChunkHolder> RelocationSink for [H] {
    fn relocated(&mut self, item: ItemId, offset: usize) {
        for holder in self.iter_mut().filter(|holder| holder.item_id() == item) {
            holder.set_offset(offset);
        }
    }
}

impl<H: ChunkHolder, S: BuildHasher> RelocationSink for HashMap<ItemId, H, S> {
    fn relocated(&mut self, item: ItemId, offset: usize) {
        if let Some(holder) = self.get_mut(&item) {
            holder.set_offset(offset);
        }
    }
}

impl<H: ChunkHolder> RelocationSink for BTreeMap<ItemId, H> {
    fn relocated(&mut self, item: ItemId, offset: usize) {
        if let Some(holder) = self.get_mut(&item) {
            holder.set_offset(offset);
        }
    }
}

/// Moves not yet delivered, latest offset per item.
#[derive(Debug, Default, Clone)]
pub(crate) struct RelocationLog {
    moves: BTreeMap<ItemId, usize>,
}

impl RelocationLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, item: ItemId, offset: usize) {
        self.moves.insert(item, offset);
    }

    /// Drops the pending note of an item that no longer owns a chunk.
    pub(crate) fn forget(&mut self, item: ItemId) {
        self.moves.remove(&item);
    }

    pub(crate) fn clear(&mut self) {
        self.moves.clear();
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.moves.len()
    }

    pub(crate) fn take(&mut self) -> impl Iterator<Item = Relocation> {
        std::mem::take(&mut self.moves)
            .into_iter()
            .map(|(item, offset)| Relocation { item, offset })
    }
}

impl<R: Copy + Default> ChunkArena<R> {
    /// Number of moves not yet delivered.
    #[inline]
    #[must_use]
    pub fn pending_relocations(&self) -> usize {
        self.relocations.len()
    }

    /// Takes every pending move, in item order.
    pub fn drain_relocations(&mut self) -> impl Iterator<Item = Relocation> {
        self.relocations.take()
    }

    /// Writes every pending move into `sink` and returns how many there were.
    pub fn deliver_relocations<S: RelocationSink + ?Sized>(&mut self, sink: &mut S) -> usize {
        let mut delivered = 0;
        for relocation in self.relocations.take() {
            sink.relocated(relocation.item, relocation.offset);
            delivered += 1;
        }
        if delivered > 0 {
            trace!(delivered, "relocations delivered");
        }
        delivered
    }

    /// [`ChunkArena::allocate`], then delivers any moves it caused.
    ///
    /// # Errors
    ///
    /// As [`ChunkArena::allocate`].
    pub fn allocate_with<S: RelocationSink + ?Sized>(
        &mut self,
        item: ItemId,
        size: usize,
        sink: &mut S,
    ) -> ArenaResult<usize> {
        let result = self.allocate(item, size);
        self.deliver_relocations(sink);
        result
    }

    /// [`ChunkArena::start_item`], then delivers any moves it caused.
    ///
    /// # Errors
    ///
    /// As [`ChunkArena::start_item`].
    pub fn start_item_with<S: RelocationSink + ?Sized>(
        &mut self,
        item: ItemId,
        sink: &mut S,
    ) -> ArenaResult<()> {
        let result = self.start_item(item);
        self.deliver_relocations(sink);
        result
    }

    /// [`ChunkArena::append`], then delivers any moves it caused.
    ///
    /// # Errors
    ///
    /// As [`ChunkArena::append`].
    pub fn append_with<S: RelocationSink + ?Sized>(
        &mut self,
        item: ItemId,
        records: &[R],
        sink: &mut S,
    ) -> ArenaResult<()> {
        let result = self.append(item, records);
        self.deliver_relocations(sink);
        result
    }

    /// [`ChunkArena::resize`], then delivers any moves it caused.
    ///
    /// # Errors
    ///
    /// As [`ChunkArena::resize`].
    pub fn resize_with<S: RelocationSink + ?Sized>(
        &mut self,
        new_capacity: usize,
        sink: &mut S,
    ) -> ArenaResult<()> {
        let result = self.resize(new_capacity);
        self.deliver_relocations(sink);
        result
    }

    /// [`ChunkArena::defragment`], then delivers any moves it caused.
    ///
    /// # Errors
    ///
    /// As [`ChunkArena::defragment`].
    pub fn defragment_with<S: RelocationSink + ?Sized>(&mut self, sink: &mut S) -> ArenaResult<()> {
        let result = self.defragment();
        self.deliver_relocations(sink);
        result
    }
}
