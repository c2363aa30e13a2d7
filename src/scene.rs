use std::path::Path;

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec2, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

/// Format-neutral scene produced by a decoder.
///
/// Mirrors what model decoders hand back: a flat mesh table plus a node tree
/// whose nodes reference meshes by index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneGraph {
    pub meshes: Vec<SourceMesh>,
    pub root: Option<SceneNode>,
}

impl SceneGraph {
    /// A scene without meshes cannot produce anything drawable.
    pub fn is_incomplete(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Applies the requested post-processing steps to every mesh.
    pub fn post_process(&mut self, steps: PostProcess) {
        for mesh in &mut self.meshes {
            if steps.triangulate {
                mesh.triangulate();
            }
            if steps.generate_normals && mesh.normals.is_none() {
                mesh.generate_normals();
            }
            if steps.flip_uvs {
                mesh.flip_uvs();
            }
        }
    }
}

/// Node of the decoded scene tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub transform: Mat4,
    pub mesh_indices: Vec<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            mesh_indices: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_meshes(mut self, mesh_indices: impl IntoIterator<Item = usize>) -> Self {
        self.mesh_indices.extend(mesh_indices);
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }
}

/// Mesh as decoded, before it is flattened into GPU vertices.
///
/// `faces` are polygons of indices into the per-vertex channels; optional
/// channels are either absent or exactly as long as `positions`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Option<Vec<Vec3>>,
    pub tex_coords: Option<Vec<Vec2>>,
    pub faces: Vec<Vec<u32>>,
}

impl SourceMesh {
    /// Fan-triangulates polygons; points and lines are dropped.
    pub fn triangulate(&mut self) {
        let mut triangles = Vec::with_capacity(self.faces.len());
        let mut dropped = 0usize;
        for polygon in &self.faces {
            if polygon.len() < 3 {
                dropped += 1;
                continue;
            }
            triangulate_face(polygon, &mut triangles);
        }
        if dropped > 0 {
            debug!("mesh {:?}: dropped {dropped} degenerate face(s)", self.name);
        }
        self.faces = triangles;
    }

    /// Computes smooth per-vertex normals from triangle faces.
    pub fn generate_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.positions.len()];

        for face in self.faces.iter().filter(|face| face.len() >= 3) {
            let i0 = face[0] as usize;
            for window in face[1..].windows(2) {
                let (i1, i2) = (window[0] as usize, window[1] as usize);
                let (Some(p0), Some(p1), Some(p2)) = (
                    self.positions.get(i0),
                    self.positions.get(i1),
                    self.positions.get(i2),
                ) else {
                    continue;
                };
                let normal = (*p1 - *p0).cross(*p2 - *p0);
                if normal.length_squared() > f32::EPSILON {
                    let normal = normal.normalize();
                    accum[i0] += normal;
                    accum[i1] += normal;
                    accum[i2] += normal;
                }
            }
        }

        self.normals = Some(accum.into_iter().map(Vec3::normalize_or_zero).collect());
    }

    /// Converts a bottom-left texture origin into a top-left one.
    pub fn flip_uvs(&mut self) {
        if let Some(tex_coords) = self.tex_coords.as_mut() {
            for uv in tex_coords {
                uv.y = 1.0 - uv.y;
            }
        }
    }
}

fn triangulate_face(polygon: &[u32], faces: &mut Vec<Vec<u32>>) {
    if polygon.len() < 3 {
        return;
    }
    for i in 1..(polygon.len() - 1) {
        faces.push(vec![polygon[0], polygon[i], polygon[i + 1]]);
    }
}

/// Post-processing steps applied after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcess {
    pub triangulate: bool,
    pub generate_normals: bool,
    pub flip_uvs: bool,
}

impl PostProcess {
    pub const NONE: Self = Self {
        triangulate: false,
        generate_normals: false,
        flip_uvs: false,
    };

    /// Triangulate, generate missing normals, flip V.
    pub const VIEWER: Self = Self {
        triangulate: true,
        generate_normals: true,
        flip_uvs: true,
    };
}

impl Default for PostProcess {
    fn default() -> Self {
        Self::VIEWER
    }
}

/// Model file formats understood by the decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    Obj,
    Gltf,
}

impl SceneFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "obj" => Some(Self::Obj),
            "gltf" | "glb" => Some(Self::Gltf),
            _ => None,
        }
    }
}

/// Decodes raw bytes of the given format into a scene graph.
pub fn decode_scene(format: SceneFormat, name: &str, data: &[u8]) -> Result<SceneGraph> {
    match format {
        SceneFormat::Obj => {
            let text = std::str::from_utf8(data)
                .map_err(|err| anyhow!("{name} is not valid UTF-8: {err}"))?;
            crate::obj::load_obj_from_str(name, text)
        }
        SceneFormat::Gltf => crate::gltf_doc::load_gltf_from_slice(name, data),
    }
}

/// Decodes a model file from disk.
///
/// glTF files are read through the `gltf` importer so that external buffers
/// next to the file resolve.
pub fn decode_scene_file(format: SceneFormat, path: &Path) -> Result<SceneGraph> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("scene");
    match format {
        SceneFormat::Obj => {
            let bytes =
                std::fs::read(path).with_context(|| format!("unable to read {}", path.display()))?;
            decode_scene(format, name, &bytes)
        }
        SceneFormat::Gltf => crate::gltf_doc::load_gltf_file(name, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> SourceMesh {
        SourceMesh {
            name: "quad".to_string(),
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            normals: None,
            tex_coords: Some(vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 0.25),
            ]),
            faces: vec![vec![0, 1, 2, 3], vec![0, 1]],
        }
    }

    #[test]
    fn triangulate_fans_polygons_and_drops_lines() {
        let mut mesh = quad();
        mesh.triangulate();
        assert_eq!(mesh.faces, vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn generated_normals_face_the_winding() {
        let mut mesh = quad();
        mesh.triangulate();
        mesh.generate_normals();
        for normal in mesh.normals.unwrap() {
            assert!((normal - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn post_process_keeps_existing_normals() {
        let mut scene = SceneGraph {
            meshes: vec![SourceMesh {
                normals: Some(vec![Vec3::X; 4]),
                ..quad()
            }],
            root: Some(SceneNode::new("root").with_meshes([0])),
        };
        scene.post_process(PostProcess::VIEWER);
        assert_eq!(scene.meshes[0].normals.as_deref(), Some(&[Vec3::X; 4][..]));
    }

    #[test]
    fn flip_uvs_mirrors_v() {
        let mut mesh = quad();
        mesh.flip_uvs();
        let uvs = mesh.tex_coords.unwrap();
        assert_eq!(uvs[0], Vec2::new(0.0, 1.0));
        assert_eq!(uvs[3], Vec2::new(0.0, 0.75));
    }

    #[test]
    fn format_is_picked_by_extension() {
        assert_eq!(SceneFormat::from_path(Path::new("a/b.OBJ")), Some(SceneFormat::Obj));
        assert_eq!(SceneFormat::from_path(Path::new("c.glb")), Some(SceneFormat::Gltf));
        assert_eq!(SceneFormat::from_path(Path::new("d.fbx")), None);
        assert_eq!(SceneFormat::from_path(Path::new("noext")), None);
    }
}
