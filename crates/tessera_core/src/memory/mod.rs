//! # Memory Management
//!
//! The chunk arena and its bookkeeping.
//!
//! ## Layout
//!
//! - `arena` - the buffer, queries, allocation, free, resize, validation
//! - `writer` - incremental `start_item` / `append` / `end_item` protocol
//! - `compaction` - defragmentation, in place or into a shrunk buffer
//! - `free_list` - best-fit free-chunk index with coalescing
//! - `relocation` - write-back of moved offsets into caller-side holders
//! - `chunk` - item identities and the reserved-chunk table

mod arena;
mod chunk;
mod compaction;
mod free_list;
mod relocation;
mod stats;
mod writer;

pub use arena::ChunkArena;
pub use chunk::{ChunkHolder, ItemId, ReservedChunk};
pub use free_list::FreeChunk;
pub use relocation::{Relocation, RelocationSink};
pub use stats::ArenaStats;
