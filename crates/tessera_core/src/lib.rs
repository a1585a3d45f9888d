//! # TESSERA Core
//!
//! Growable arena for fixed-stride records (vertices, instances, any `Copy`
//! record), designed for:
//! - Producers that don't know how many records an item needs up front
//! - Consumers that hold offsets and get them written back when data moves
//! - Long-lived buffers that fragment and must be compacted in place
//!
//! ## Architecture Rules
//!
//! 1. **Offsets, not pointers** - items are addressed by slot index
//! 2. **Partition invariant** - free and reserved chunks tile the buffer exactly
//! 3. **Sticky failure** - an allocation failure disables all further mutation
//!
//! ## Example
//!
//! ```rust
//! use tessera_core::{ChunkArena, ItemId};
//!
//! let mut arena: ChunkArena<[f32; 3]> = ChunkArena::new(1024);
//! let triangle = ItemId::new(7);
//!
//! arena.start_item(triangle)?;
//! arena.append(triangle, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])?;
//! arena.end_item(triangle)?;
//!
//! let offset = arena.offset_of(triangle);
//! assert_eq!(offset, Some(0));
//! # Ok::<(), tessera_core::ArenaError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod memory;

pub use config::ArenaConfig;
pub use error::{ArenaError, ArenaResult, ProtocolMisuse};
pub use memory::{
    ArenaStats, ChunkArena, ChunkHolder, FreeChunk, ItemId, Relocation, RelocationSink,
    ReservedChunk,
};
