//! Vertex records for GPU upload.

use bytemuck::{Pod, Zeroable};

/// One vertex as stored in the arena and consumed by the vertex shader.
///
/// 32 bytes, 4-byte aligned, no padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// World position (x, y, z).
    pub position: [f32; 3],

    /// RGBA color.
    pub color: [u8; 4],

    /// Auxiliary shader parameters (primitive kind, line width, ...).
    pub shader: [f32; 4],
}

impl Vertex {
    /// Size in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates a vertex with no shader parameters.
    #[must_use]
    pub fn new(x: f32, y: f32, z: f32, color: [u8; 4]) -> Self {
        Self {
            position: [x, y, z],
            color,
            shader: [0.0; 4],
        }
    }

    /// Sets shader parameters for this vertex.
    #[must_use]
    pub fn with_shader(mut self, shader: [f32; 4]) -> Self {
        self.shader = shader;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        // 12 (position) + 4 (color) + 16 (shader)
        assert_eq!(Vertex::SIZE, 32);
    }

    #[test]
    fn test_vertex_alignment() {
        assert_eq!(std::mem::align_of::<Vertex>(), 4);
    }

    #[test]
    fn test_bytes_round_through_pod() {
        let vertex = Vertex::new(1.0, 2.0, 3.0, [255, 0, 0, 255]).with_shader([1.0, 0.0, 0.0, 0.0]);
        let bytes = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), Vertex::SIZE);
        assert_eq!(*bytemuck::from_bytes::<Vertex>(bytes), vertex);
    }
}
