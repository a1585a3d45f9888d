//! # TESSERA Rendering
//!
//! Vertex storage for drawables whose vertex count is only known once they
//! have been tessellated.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     VERTEX STORE                          │
//! ├──────────────────────────────────────────────────────────┤
//! │  begin → push/extend → end  ──►  ChunkArena<Vertex>       │
//! │       ↓                               ↓ moves             │
//! │  Drawable registry  ◄──────── relocation write-back       │
//! │       ↓                               ↓                   │
//! │  DrawRange                    as_bytes() → GPU upload      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - No GPU calls in this crate
//! - Every arena call that can move vertices passes the drawable registry

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod store;
pub mod vertex;

pub use store::{DrawRange, Drawable, VertexStore};
pub use vertex::Vertex;
