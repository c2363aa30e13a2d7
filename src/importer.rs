//! Flattens a decoded scene graph into a list of triangle meshes.
//!
//! Traversal is depth-first pre-order: a node's meshes come before those of
//! its children, children in declaration order. A mesh referenced by several
//! nodes is imported once per reference.

use std::path::{Path, PathBuf};

use glam::{Mat3, Mat4, Vec2, Vec3};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{ImportError, MeshError};
use crate::mesh::MeshData;
use crate::scene::{self, PostProcess, SceneFormat, SceneGraph, SceneNode, SourceMesh};
use crate::vertex::Vertex;

/// Knobs for [`import_model`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportOptions {
    pub post_process: PostProcess,
    /// Bake accumulated node transforms into vertex data.
    pub bake_node_transforms: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            post_process: PostProcess::VIEWER,
            bake_node_transforms: false,
        }
    }
}

/// CPU-side result of one import, in traversal order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelData {
    pub source: PathBuf,
    pub meshes: Vec<MeshData>,
}

impl ModelData {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(MeshData::triangle_count).sum()
    }
}

/// Imports the model file at `path`, picking the decoder by extension.
pub fn import_model(path: impl AsRef<Path>, options: ImportOptions) -> Result<ModelData, ImportError> {
    let path = path.as_ref();
    let format = SceneFormat::from_path(path).ok_or_else(|| ImportError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let scene = scene::decode_scene_file(format, path).map_err(|source| ImportError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    import_scene(path, scene, options)
}

/// Imports a model held in memory, e.g. one bundled as a resource.
pub fn import_model_from_bytes(
    name: &str,
    data: &[u8],
    options: ImportOptions,
) -> Result<ModelData, ImportError> {
    let path = PathBuf::from(name);
    let format = SceneFormat::from_path(&path)
        .ok_or_else(|| ImportError::UnsupportedFormat { path: path.clone() })?;
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name);
    let scene = scene::decode_scene(format, stem, data).map_err(|source| ImportError::Decode {
        path: path.clone(),
        source,
    })?;
    import_scene(&path, scene, options)
}

/// Validates and flattens an already decoded scene.
pub fn import_scene(
    path: &Path,
    mut scene: SceneGraph,
    options: ImportOptions,
) -> Result<ModelData, ImportError> {
    if scene.is_incomplete() {
        return Err(ImportError::Incomplete {
            path: path.to_path_buf(),
        });
    }
    let Some(root) = scene.root.take() else {
        return Err(ImportError::MissingRoot {
            path: path.to_path_buf(),
        });
    };
    scene.post_process(options.post_process);

    let mut meshes = Vec::new();
    let mut stack = vec![(&root, Mat4::IDENTITY)];
    while let Some((node, parent)) = stack.pop() {
        let world = parent * node.transform;
        for &mesh_index in &node.mesh_indices {
            let source = scene
                .meshes
                .get(mesh_index)
                .ok_or_else(|| ImportError::DanglingMesh {
                    node: node.name.clone(),
                    mesh: mesh_index,
                    available: scene.meshes.len(),
                })?;
            let transform = options.bake_node_transforms.then_some(world);
            let mesh = convert_mesh(source, transform).map_err(|source| {
                ImportError::InvalidMesh {
                    path: path.to_path_buf(),
                    mesh: meshes.len(),
                    source,
                }
            })?;
            debug!(
                "imported mesh {:?} from node {:?}: {} vertices, {} indices",
                mesh.name,
                node.name,
                mesh.vertices.len(),
                mesh.indices.len()
            );
            meshes.push(mesh);
        }
        // Reverse so the first child is visited first.
        stack.extend(node.children.iter().rev().map(|child| (child, world)));
    }

    let model = ModelData {
        source: path.to_path_buf(),
        meshes,
    };
    info!(
        "imported {} with {} mesh(es), {} triangles",
        path.display(),
        model.meshes.len(),
        model.triangle_count()
    );
    Ok(model)
}

fn convert_mesh(source: &SourceMesh, transform: Option<Mat4>) -> Result<MeshData, MeshError> {
    let normal_matrix = transform.map(|m| Mat3::from_mat4(m).inverse().transpose());

    let vertices = source
        .positions
        .iter()
        .enumerate()
        .map(|(i, &position)| {
            let tex_coord = source
                .tex_coords
                .as_ref()
                .and_then(|coords| coords.get(i).copied())
                .unwrap_or(Vec2::ZERO);
            let normal = source
                .normals
                .as_ref()
                .and_then(|normals| normals.get(i).copied())
                .unwrap_or(Vec3::ZERO);
            match (transform, normal_matrix) {
                (Some(world), Some(normal_matrix)) => Vertex::new(
                    world.transform_point3(position),
                    tex_coord,
                    (normal_matrix * normal).normalize_or_zero(),
                ),
                _ => Vertex::new(position, tex_coord, normal),
            }
        })
        .collect();

    let mut indices = Vec::with_capacity(source.faces.len() * 3);
    for (face_index, face) in source.faces.iter().enumerate() {
        if face.len() != 3 {
            return Err(MeshError::NonTriangularFace {
                face: face_index,
                count: face.len(),
            });
        }
        indices.extend_from_slice(face);
    }

    MeshData::new(source.name.clone(), vertices, indices)
}
