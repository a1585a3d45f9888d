//! # Compaction
//!
//! Packs every reserved chunk to the front of the buffer, in offset order,
//! leaving a single free chunk at the tail.
//!
//! ```text
//! before:  [A A][ free ][C C C][free][D]
//! after:   [A A][C C C][D][    free     ]
//! ```
//!
//! The new chunk table is built from an immutable snapshot of the old one and
//! swapped in at the end. An open item is moved like any other chunk; its
//! cursor counts records, not addresses, so it stays valid.

use tracing::debug;

use super::arena::ChunkArena;
use super::chunk::{ChunkTable, ReservedChunk};
use super::free_list::FreeList;
use crate::error::ArenaResult;

impl<R: Copy + Default> ChunkArena<R> {
    /// Eliminates external fragmentation.
    ///
    /// A no-op when free space is already a single chunk (or none).
    /// Offsets of moved items change; see [`ChunkArena::defragment_with`] to
    /// have them written back into holders.
    ///
    /// # Errors
    ///
    /// [`ArenaError::Failed`](crate::ArenaError::Failed) if the arena already failed.
    pub fn defragment(&mut self) -> ArenaResult<()> {
        self.ensure_live()?;
        if self.free.len() <= 1 {
            return Ok(());
        }
        self.compact_in_place();
        Ok(())
    }

    /// Packs chunks within the current buffer.
    pub(super) fn compact_in_place(&mut self) {
        let snapshot = self.reserved.sorted_by_offset();
        let mut packed = Vec::with_capacity(snapshot.len());
        let mut next = 0;
        let mut moved = 0;

        for chunk in snapshot {
            // Destination never lies past the source, so forward order is safe.
            if chunk.offset != next {
                self.buffer.copy_within(chunk.offset..chunk.end(), next);
                self.relocations.record(chunk.item, next);
                moved += 1;
            }
            packed.push(ReservedChunk {
                offset: next,
                ..chunk
            });
            next += chunk.size;
        }

        self.adopt_packed(packed, next, moved);
    }

    /// Packs chunks into `target` (an empty buffer with room for
    /// `new_capacity` records) and adopts it.
    pub(super) fn compact_into(&mut self, mut target: Vec<R>, new_capacity: usize) {
        let snapshot = self.reserved.sorted_by_offset();
        let mut packed = Vec::with_capacity(snapshot.len());
        let mut moved = 0;

        for chunk in snapshot {
            let next = target.len();
            if chunk.offset != next {
                self.relocations.record(chunk.item, next);
                moved += 1;
            }
            target.extend_from_slice(&self.buffer[chunk.offset..chunk.end()]);
            packed.push(ReservedChunk {
                offset: next,
                ..chunk
            });
        }

        let used = target.len();
        target.resize(new_capacity, R::default());
        self.buffer = target;
        self.adopt_packed(packed, used, moved);
    }

    fn adopt_packed(&mut self, packed: Vec<ReservedChunk>, used: usize, moved: usize) {
        self.reserved = ChunkTable::from_chunks(packed);
        self.free = FreeList::spanning(used, self.capacity() - used);
        self.defragmentations += 1;
        if moved > 0 {
            self.generation += 1;
        }
        debug!(
            moved,
            used,
            capacity = self.capacity(),
            "arena compacted"
        );
    }
}
