use log::debug;

use crate::importer::ModelData;
use crate::mesh::MeshBuffer;

/// Every mesh of one imported file, resident on the GPU.
///
/// The model is the sole owner of its mesh buffers; releasing it releases
/// each buffer exactly once.
#[derive(Debug)]
pub struct Model {
    meshes: Vec<MeshBuffer>,
}

impl Model {
    pub fn upload(device: &wgpu::Device, data: &ModelData) -> Self {
        let meshes = data
            .meshes
            .iter()
            .map(|mesh| MeshBuffer::create(device, mesh))
            .collect::<Vec<_>>();
        debug!("uploaded {} mesh buffer(s)", meshes.len());
        Self { meshes }
    }

    pub fn meshes(&self) -> &[MeshBuffer] {
        &self.meshes
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        for mesh in &self.meshes {
            mesh.draw(pass);
        }
    }

    pub fn release(self) {
        for mesh in self.meshes {
            mesh.destroy();
        }
    }
}
