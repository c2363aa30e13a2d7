use serde::{Deserialize, Serialize};
use wgpu::util::DeviceExt;

use crate::error::MeshError;
use crate::vertex::Vertex;

/// CPU-side triangle list ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Builds a mesh, checking the triangle-list invariants.
    pub fn new(
        name: impl Into<String>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
    ) -> Result<Self, MeshError> {
        let mesh = Self {
            name: name.into(),
            vertices,
            indices,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::PartialTriangle(self.indices.len()));
        }
        let vertex_count = self.vertices.len();
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&index| index as usize >= vertex_count)
        {
            return Err(MeshError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        Ok(())
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// GPU vertex and index buffers for one mesh.
///
/// The attribute binding (slots 0/1/2 over one interleaved stream) lives in
/// the pipeline's vertex layout, see [`Vertex::layout`]. Buffers are released
/// when the value is dropped or passed to [`MeshBuffer::destroy`].
#[derive(Debug)]
pub struct MeshBuffer {
    label: String,
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    vertex_count: u32,
}

impl MeshBuffer {
    /// Uploads vertices and indices once into immutable buffers.
    pub fn create(device: &wgpu::Device, mesh: &MeshData) -> Self {
        let label = if mesh.name.is_empty() {
            "mesh".to_string()
        } else {
            mesh.name.clone()
        };
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            label,
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
            vertex_count: mesh.vertices.len() as u32,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Records an indexed triangle-list draw over every index.
    ///
    /// Meshes without triangles record nothing; wgpu rejects empty buffer
    /// slices.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.index_count == 0 || self.vertex_count == 0 {
            return;
        }
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        pass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    /// Frees the GPU memory now instead of waiting for the drop.
    pub fn destroy(self) {
        self.vertex.destroy();
        self.index.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn triangle() -> Vec<Vertex> {
        vec![
            Vertex::from_position(Vec3::ZERO),
            Vertex::from_position(Vec3::X),
            Vertex::from_position(Vec3::Y),
        ]
    }

    #[test]
    fn accepts_valid_triangle_list() {
        let mesh = MeshData::new("tri", triangle(), vec![0, 1, 2]).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn rejects_partial_triangle() {
        assert_eq!(
            MeshData::new("tri", triangle(), vec![0, 1]).unwrap_err(),
            MeshError::PartialTriangle(2)
        );
    }

    fn noop_device() -> (wgpu::Device, wgpu::Queue) {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::NOOP,
            backend_options: wgpu::BackendOptions {
                noop: wgpu::NoopBackendOptions { enable: true },
                ..Default::default()
            },
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
            .expect("noop adapter");
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).expect("noop device")
    }

    #[test]
    fn empty_mesh_draw_records_nothing() {
        let (device, queue) = noop_device();
        let mesh = MeshData::new("empty", triangle(), Vec::new()).unwrap();
        let buffer = MeshBuffer::create(&device, &mesh);
        assert_eq!(buffer.index_count(), 0);

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("target"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("empty-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            buffer.draw(&mut pass);
        }
        queue.submit(std::iter::once(encoder.finish()));
        buffer.destroy();
    }

    #[test]
    fn rejects_out_of_range_index() {
        assert_eq!(
            MeshData::new("tri", triangle(), vec![0, 1, 3]).unwrap_err(),
            MeshError::IndexOutOfRange {
                index: 3,
                vertex_count: 3
            }
        );
    }
}
