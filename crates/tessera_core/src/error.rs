//! # Arena Error Types
//!
//! All errors that can occur while driving a [`ChunkArena`](crate::ChunkArena).
//!
//! Two families matter to callers:
//! - [`ArenaError::AllocationFailure`] is fatal and latches the arena into the
//!   failed state. Every later mutating call answers [`ArenaError::Failed`].
//! - [`ArenaError::ProtocolMisuse`] is a caller bug. It never latches.

use thiserror::Error;

use crate::memory::ItemId;

/// Ways a caller can break the item-write protocol or the one-chunk-per-item rule.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMisuse {
    /// `start_item` while another item is still open.
    #[error("item {requested} started while item {open} is still being written")]
    NestedStart {
        /// The item that is currently open.
        open: ItemId,
        /// The item the caller tried to start.
        requested: ItemId,
    },

    /// `append`/`end_item` with no item open.
    #[error("item {0} is not being written")]
    NotOpen(ItemId),

    /// `append`/`end_item` for an item other than the open one.
    #[error("item {requested} used while item {open} is the one being written")]
    WrongItem {
        /// The item that is currently open.
        open: ItemId,
        /// The item the caller passed.
        requested: ItemId,
    },

    /// Allocation for an item that already owns a chunk.
    #[error("item {0} already owns a chunk; free it first")]
    AlreadyAllocated(ItemId),

    /// Freeing the item that is still being written.
    #[error("item {0} cannot be freed while it is being written")]
    ItemInProgress(ItemId),
}

/// Errors that can occur in the chunk arena.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// The buffer could not be obtained or extended.
    #[error("allocation failure: requested {requested} slots at capacity {capacity} (limit {limit:?})")]
    AllocationFailure {
        /// Capacity (in slots) that was asked for.
        requested: usize,
        /// Capacity at the time of the request.
        capacity: usize,
        /// Configured hard cap, if any.
        limit: Option<usize>,
    },

    /// The arena previously hit an allocation failure and refuses all mutation.
    #[error("arena is in the failed state; recreate it")]
    Failed,

    /// Caller broke the incremental-write protocol.
    #[error("protocol misuse: {0}")]
    ProtocolMisuse(#[from] ProtocolMisuse),

    /// The item owns no chunk in this arena.
    #[error("unknown item: {0}")]
    UnknownItem(ItemId),

    /// A shrink would not leave room for the live data.
    #[error("cannot shrink to {requested} slots: {live} slots are live")]
    ShrinkRejected {
        /// Requested capacity.
        requested: usize,
        /// Slots currently reserved.
        live: usize,
    },

    /// Invalid configuration file or values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal bookkeeping no longer matches the buffer.
    #[error("arena corrupted: {0}")]
    Corrupted(String),
}

impl ArenaError {
    /// Returns true for errors that latch the arena into the failed state.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::AllocationFailure { .. } | Self::Failed)
    }
}

/// Result type for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;
