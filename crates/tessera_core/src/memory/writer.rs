//! # Incremental Item Writes
//!
//! Producers often don't know how many records a shape decomposes into.
//! Instead of a pre-sized allocation they open an item, append in pieces and
//! close it:
//!
//! ```text
//! start_item(x)      reserve min_reserve slots, cursor = 0
//! append(x, [..n])   cursor + n > reserved? move to 2 * cursor + n slots
//! end_item(x)        return [cursor, reserved) to free space
//! ```
//!
//! Only one item may be open per arena.

use tracing::trace;

use super::arena::{ChunkArena, OpenItem};
use super::chunk::{ItemId, ReservedChunk};
use crate::error::{ArenaError, ArenaResult, ProtocolMisuse};

impl<R: Copy + Default> ChunkArena<R> {
    /// Opens `item` for incremental writing and reserves its first slots.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::Failed`] if the arena already failed
    /// - [`ProtocolMisuse::NestedStart`] if another item is open
    /// - [`ProtocolMisuse::AlreadyAllocated`] if `item` owns a chunk
    /// - [`ArenaError::AllocationFailure`] if the reservation cannot be made (latches)
    pub fn start_item(&mut self, item: ItemId) -> ArenaResult<()> {
        self.ensure_live()?;
        if let Some(open) = self.open {
            return Err(ProtocolMisuse::NestedStart {
                open: open.item,
                requested: item,
            }
            .into());
        }
        if self.reserved.contains(item) {
            return Err(ProtocolMisuse::AlreadyAllocated(item).into());
        }

        let reserve = self.config.min_reserve.max(1);
        self.allocate_chunk(item, reserve)?;
        self.open = Some(OpenItem { item, cursor: 0 });
        Ok(())
    }

    /// Appends records to the open item.
    ///
    /// When the reservation is exhausted the item moves to a chunk of
    /// `2 * written + records.len()` slots; other items may move as well.
    /// An empty slice changes nothing.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::Failed`] if the arena already failed
    /// - [`ProtocolMisuse::NotOpen`] / [`ProtocolMisuse::WrongItem`] if `item` is not the open item
    /// - [`ArenaError::AllocationFailure`] if the item cannot grow (latches)
    pub fn append(&mut self, item: ItemId, records: &[R]) -> ArenaResult<()> {
        self.ensure_live()?;
        let open = self.check_open(item)?;
        if records.is_empty() {
            return Ok(());
        }

        let count = records.len();
        let Some(needed) = open.cursor.checked_add(count) else {
            return Err(self.fail(usize::MAX));
        };
        let mut chunk = self.open_chunk(item)?;
        if needed > chunk.size {
            let Some(new_size) = open.cursor.checked_mul(2).and_then(|n| n.checked_add(count))
            else {
                return Err(self.fail(usize::MAX));
            };
            chunk = self.relocate_open(item, open.cursor, new_size)?;
        }

        let start = chunk.offset + open.cursor;
        self.buffer[start..start + count].copy_from_slice(records);
        self.open = Some(OpenItem {
            item,
            cursor: needed,
        });
        Ok(())
    }

    /// Appends a single record to the open item.
    ///
    /// # Errors
    ///
    /// As [`ChunkArena::append`].
    pub fn push(&mut self, item: ItemId, record: R) -> ArenaResult<()> {
        self.append(item, std::slice::from_ref(&record))
    }

    /// Closes the open item, trimming its chunk to the records written.
    ///
    /// Returns the final chunk.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::Failed`] if the arena already failed
    /// - [`ProtocolMisuse::NotOpen`] / [`ProtocolMisuse::WrongItem`] if `item` is not the open item
    pub fn end_item(&mut self, item: ItemId) -> ArenaResult<ReservedChunk> {
        self.ensure_live()?;
        let open = self.check_open(item)?;
        let chunk = self.open_chunk(item)?;

        if open.cursor < chunk.size {
            self.free
                .release(chunk.offset + open.cursor, chunk.size - open.cursor);
            let updated = self.reserved.update(item, chunk.offset, open.cursor);
            debug_assert!(updated, "open item {item} vanished from the table");
        }
        self.open = None;
        trace!(item = item.raw(), offset = chunk.offset, size = open.cursor, "item closed");

        Ok(ReservedChunk {
            item,
            offset: chunk.offset,
            size: open.cursor,
        })
    }

    fn check_open(&self, item: ItemId) -> ArenaResult<OpenItem> {
        match self.open {
            None => Err(ProtocolMisuse::NotOpen(item).into()),
            Some(open) if open.item != item => Err(ProtocolMisuse::WrongItem {
                open: open.item,
                requested: item,
            }
            .into()),
            Some(open) => Ok(open),
        }
    }

    fn open_chunk(&self, item: ItemId) -> ArenaResult<ReservedChunk> {
        self.reserved
            .get(item)
            .ok_or_else(|| ArenaError::Corrupted(format!("open item {item} owns no chunk")))
    }

    /// Moves the open item to a fresh chunk of `new_size` slots, carrying the
    /// first `written` records along.
    fn relocate_open(
        &mut self,
        item: ItemId,
        written: usize,
        new_size: usize,
    ) -> ArenaResult<ReservedChunk> {
        let new_offset = self.reserve_slots(new_size)?;
        // Reserving may have compacted the arena; re-read where the item lives.
        let old = self.open_chunk(item)?;

        self.buffer
            .copy_within(old.offset..old.offset + written, new_offset);
        self.free.release(old.offset, old.size);
        let updated = self.reserved.update(item, new_offset, new_size);
        debug_assert!(updated, "open item {item} vanished from the table");
        self.relocations.record(item, new_offset);
        self.generation += 1;
        trace!(
            item = item.raw(),
            from = old.offset,
            to = new_offset,
            size = new_size,
            "open item relocated"
        );

        Ok(ReservedChunk {
            item,
            offset: new_offset,
            size: new_size,
        })
    }
}
