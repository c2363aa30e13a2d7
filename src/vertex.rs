use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Interleaved vertex record uploaded to the GPU.
///
/// Layout is `position.xyz`, `tex_coord.uv`, `normal.xyz` with no padding, so
/// the stride is exactly 32 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const POSITION_SLOT: u32 = 0;
    pub const TEX_COORD_SLOT: u32 = 1;
    pub const NORMAL_SLOT: u32 = 2;

    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x2,
        2 => Float32x3
    ];

    pub fn new(position: Vec3, tex_coord: Vec2, normal: Vec3) -> Self {
        Self {
            position: position.into(),
            tex_coord: tex_coord.into(),
            normal: normal.into(),
        }
    }

    /// Vertex with only a position; texcoord and normal are zeroed.
    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Vec2::ZERO, Vec3::ZERO)
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn tex_coord(&self) -> Vec2 {
        Vec2::from_array(self.tex_coord)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }

    /// Buffer layout binding slots 0/1/2 over a single interleaved stream.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
