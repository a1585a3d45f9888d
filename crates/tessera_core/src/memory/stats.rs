//! Arena occupancy statistics.

/// Snapshot of an arena's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Total slots in the buffer.
    pub capacity: usize,
    /// Slots not owned by any item.
    pub free_slots: usize,
    /// Slots owned by items (including speculative space of an open item).
    pub reserved_slots: usize,
    /// Number of disjoint free chunks.
    pub free_chunks: usize,
    /// Largest single free chunk.
    pub largest_free_chunk: usize,
    /// Number of items owning a chunk.
    pub items: usize,
    /// Successful grow/shrink operations.
    pub resizes: u64,
    /// Compactions actually performed.
    pub defragmentations: u64,
    /// Relocation generation.
    pub generation: u64,
}

impl ArenaStats {
    /// External fragmentation: 0.0 when all free space is one chunk, towards 1.0
    /// as it splinters.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fragmentation(&self) -> f64 {
        if self.free_slots == 0 {
            return 0.0;
        }
        1.0 - self.largest_free_chunk as f64 / self.free_slots as f64
    }

    /// Fraction of the buffer owned by items.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.reserved_slots as f64 / self.capacity as f64
    }

    /// True when compaction would gain nothing.
    #[must_use]
    pub const fn is_packed(&self) -> bool {
        self.free_chunks <= 1
    }
}
