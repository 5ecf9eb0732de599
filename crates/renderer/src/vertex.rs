//! Vertex types and layouts for terrain rendering.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Terrain and grass vertex: world position, RGBA light color and UV.
///
/// Built once per quad corner and shared by the batched and immediate paths.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
    pub tex_coords: [f32; 2],
}

impl TerrainVertex {
    pub fn new(position: Vec3, color: [f32; 4], tex_coords: Vec2) -> Self {
        Self {
            position: position.to_array(),
            color,
            tex_coords: tex_coords.to_array(),
        }
    }

    /// Copy of this vertex with a different alpha.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.color[3] = alpha;
        self
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TerrainVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Color
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // UV/Tex coords
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 7]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Vertices per quad (two triangles, no index buffer).
pub const QUAD_VERTICES: usize = 6;

/// Expand four corners (counter-clockwise) into two triangles.
pub fn quad_triangles(corners: [TerrainVertex; 4]) -> [TerrainVertex; QUAD_VERTICES] {
    let [a, b, c, d] = corners;
    [a, b, c, a, c, d]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<TerrainVertex>(), 9 * 4);
    }

    #[test]
    fn quad_shares_diagonal() {
        let v = |x: f32| TerrainVertex::new(Vec3::new(x, 0.0, 0.0), [1.0; 4], Vec2::ZERO);
        let quad = quad_triangles([v(0.0), v(1.0), v(2.0), v(3.0)]);
        let xs: Vec<f32> = quad.iter().map(|v| v.position[0]).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 0.0, 2.0, 3.0]);
    }
}
