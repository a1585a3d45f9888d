//! Vertex storage for drawables.
//!
//! Drawables are recorded with the arena's begin/append/end protocol because
//! a shape rarely knows its vertex count before it is tessellated. The store
//! keeps one [`Drawable`] per recorded shape and hands it to the arena on
//! every call that can move vertices, so draw ranges are always current.

use std::collections::HashMap;

use tracing::{debug, trace};

use tessera_core::{ArenaConfig, ArenaError, ArenaResult, ChunkArena, ChunkHolder, ItemId};

use crate::vertex::Vertex;

/// Contiguous vertex range to hand to a draw call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawRange {
    /// Index of the first vertex in the buffer.
    pub first_vertex: usize,
    /// Number of vertices.
    pub vertex_count: usize,
}

impl DrawRange {
    /// Byte range of these vertices within [`VertexStore::as_bytes`].
    #[must_use]
    pub const fn byte_range(&self) -> std::ops::Range<usize> {
        let start = self.first_vertex * Vertex::SIZE;
        start..start + self.vertex_count * Vertex::SIZE
    }
}

/// Where a drawable's vertices live.
///
/// The vertex count stays zero while the drawable is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drawable {
    id: ItemId,
    offset: usize,
    len: usize,
}

impl Drawable {
    /// Arena key of this drawable.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ItemId {
        self.id
    }

    /// Draw range of the drawable.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> DrawRange {
        DrawRange {
            first_vertex: self.offset,
            vertex_count: self.len,
        }
    }
}

impl ChunkHolder for Drawable {
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
        self.len
    }

    fn set_size(&mut self, size: usize) {
        self.len = size;
    }
}

/// All vertices of all drawables, in one arena.
///
/// # Example
///
/// ```rust
/// use tessera_rendering::{Vertex, VertexStore};
///
/// let mut store = VertexStore::new(256);
/// let quad = store.begin()?;
/// let white = [255; 4];
/// store.push_triangle(quad, [
///     Vertex::new(0.0, 0.0, 0.0, white),
///     Vertex::new(1.0, 0.0, 0.0, white),
///     Vertex::new(1.0, 1.0, 0.0, white),
/// ])?;
/// let range = store.end(quad)?;
///
/// assert_eq!(range.vertex_count, 3);
/// assert_eq!(store.range(quad), Some(range));
/// # Ok::<(), tessera_core::ArenaError>(())
/// ```
pub struct VertexStore {
    arena: ChunkArena<Vertex>,
    drawables: HashMap<ItemId, Drawable>,
    next_id: u64,
}

impl VertexStore {
    /// Creates a store with room for `capacity` vertices.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_config(ArenaConfig::default().with_initial_capacity(capacity))
    }

    /// Creates a store from an arena configuration.
    #[must_use]
    pub fn with_config(config: ArenaConfig) -> Self {
        Self {
            arena: ChunkArena::with_config(config),
            drawables: HashMap::new(),
            next_id: 0,
        }
    }

    /// The underlying arena.
    #[inline]
    #[must_use]
    pub const fn arena(&self) -> &ChunkArena<Vertex> {
        &self.arena
    }

    /// True once the arena ran out of memory.
    #[inline]
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.arena.is_failed()
    }

    /// Number of drawables, including one being recorded.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    /// True if the store holds no drawables.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    /// Opens a new drawable for recording.
    ///
    /// # Errors
    ///
    /// Propagates arena errors (another drawable open, allocation failure).
    pub fn begin(&mut self) -> ArenaResult<ItemId> {
        let id = ItemId::new(self.next_id);
        self.arena.start_item_with(id, &mut self.drawables)?;
        self.next_id += 1;

        let offset = self
            .arena
            .offset_of(id)
            .ok_or(ArenaError::UnknownItem(id))?;
        self.drawables.insert(id, Drawable { id, offset, len: 0 });
        trace!(drawable = id.raw(), offset, "drawable opened");
        Ok(id)
    }

    /// Appends one vertex to the open drawable.
    ///
    /// # Errors
    ///
    /// Propagates arena errors.
    pub fn push(&mut self, id: ItemId, vertex: Vertex) -> ArenaResult<()> {
        self.extend(id, std::slice::from_ref(&vertex))
    }

    /// Appends a triangle to the open drawable.
    ///
    /// # Errors
    ///
    /// Propagates arena errors.
    pub fn push_triangle(&mut self, id: ItemId, triangle: [Vertex; 3]) -> ArenaResult<()> {
        self.extend(id, &triangle)
    }

    /// Appends vertices to the open drawable.
    ///
    /// # Errors
    ///
    /// Propagates arena errors.
    pub fn extend(&mut self, id: ItemId, vertices: &[Vertex]) -> ArenaResult<()> {
        self.arena.append_with(id, vertices, &mut self.drawables)
    }

    /// Closes the open drawable and returns its final draw range.
    ///
    /// # Errors
    ///
    /// Propagates arena errors.
    pub fn end(&mut self, id: ItemId) -> ArenaResult<DrawRange> {
        let chunk = self.arena.end_item(id)?;
        let drawable = self
            .drawables
            .get_mut(&id)
            .ok_or(ArenaError::UnknownItem(id))?;
        drawable.set_offset(chunk.offset);
        drawable.set_size(chunk.size);
        Ok(drawable.range())
    }

    /// Releases a drawable's vertices.
    ///
    /// # Errors
    ///
    /// Propagates arena errors.
    pub fn remove(&mut self, id: ItemId) -> ArenaResult<()> {
        self.arena.free(id)?;
        self.drawables.remove(&id);
        Ok(())
    }

    /// Current location of a drawable.
    #[must_use]
    pub fn drawable(&self, id: ItemId) -> Option<Drawable> {
        self.drawables.get(&id).copied()
    }

    /// Current draw range of a drawable.
    #[must_use]
    pub fn range(&self, id: ItemId) -> Option<DrawRange> {
        self.drawables.get(&id).map(Drawable::range)
    }

    /// All drawables, in no particular order.
    pub fn drawables(&self) -> impl Iterator<Item = Drawable> + '_ {
        self.drawables.values().copied()
    }

    /// Current vertices of a drawable.
    #[must_use]
    pub fn vertices(&self, id: ItemId) -> Option<&[Vertex]> {
        self.arena.records_for(id)
    }

    /// Recolors every vertex of a drawable in place.
    ///
    /// Returns false for unknown drawables.
    pub fn recolor(&mut self, id: ItemId, color: [u8; 4]) -> bool {
        self.update(id, |vertex| vertex.color = color)
    }

    /// Moves every vertex of a drawable by `delta` in place.
    ///
    /// Returns false for unknown drawables.
    pub fn translate(&mut self, id: ItemId, delta: [f32; 3]) -> bool {
        self.update(id, |vertex| {
            for (axis, d) in vertex.position.iter_mut().zip(delta) {
                *axis += d;
            }
        })
    }

    /// Compacts the store.
    ///
    /// # Errors
    ///
    /// Propagates arena errors.
    pub fn compact(&mut self) -> ArenaResult<()> {
        let before = self.arena.stats();
        self.arena.defragment_with(&mut self.drawables)?;
        debug!(
            free_chunks = before.free_chunks,
            fragmentation = before.fragmentation(),
            "vertex store compacted"
        );
        Ok(())
    }

    /// Resizes the vertex buffer to `capacity` vertices.
    ///
    /// # Errors
    ///
    /// Propagates arena errors; shrinking below the live vertices is refused.
    pub fn resize(&mut self, capacity: usize) -> ArenaResult<()> {
        self.arena.resize_with(capacity, &mut self.drawables)
    }

    /// The whole vertex buffer as bytes, for upload.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.arena.as_bytes()
    }

    fn update(&mut self, id: ItemId, mut apply: impl FnMut(&mut Vertex)) -> bool {
        match self.arena.records_for_mut(id) {
            Some(vertices) => {
                vertices.iter_mut().for_each(&mut apply);
                true
            }
            None => false,
        }
    }
}
