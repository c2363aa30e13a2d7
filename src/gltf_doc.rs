//! glTF 2.0 decoding into the format-neutral scene graph.
//!
//! Each triangle primitive becomes one `SourceMesh`. Texture coordinates are
//! converted to a bottom-left origin so that every decoder hands back the
//! same convention and the V flip in post-processing applies uniformly.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec2, Vec3};
use gltf::mesh::Mode;
use log::{debug, warn};

use crate::scene::{SceneGraph, SceneNode, SourceMesh};

/// Loads a `.gltf`/`.glb` file, resolving buffers relative to its directory.
pub fn load_gltf_file(name: &str, path: &Path) -> Result<SceneGraph> {
    let (document, buffers, _images) =
        gltf::import(path).with_context(|| format!("unable to import glTF {}", path.display()))?;
    build_scene(name, &document, &buffers)
}

/// Loads a self-contained glTF document (GLB or data URIs) from memory.
pub fn load_gltf_from_slice(name: &str, data: &[u8]) -> Result<SceneGraph> {
    let (document, buffers, _images) =
        gltf::import_slice(data).with_context(|| format!("unable to import glTF {name}"))?;
    build_scene(name, &document, &buffers)
}

fn build_scene(
    name: &str,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Result<SceneGraph> {
    let mut meshes = Vec::new();
    // glTF mesh index -> flat SourceMesh indices, one per kept primitive.
    let mut mesh_index_map = Vec::new();

    for mesh in document.meshes() {
        let mut flat_indices = Vec::new();
        for (prim_idx, primitive) in mesh.primitives().enumerate() {
            let label = match mesh.name() {
                Some(mesh_name) => format!("{mesh_name}#{prim_idx}"),
                None => format!("mesh{}#{prim_idx}", mesh.index()),
            };
            match load_primitive(&label, &primitive, buffers)? {
                Some(source) => {
                    flat_indices.push(meshes.len());
                    meshes.push(source);
                }
                None => warn!(
                    "skipping primitive {label}: {:?} topology is not triangles",
                    primitive.mode()
                ),
            }
        }
        mesh_index_map.push(flat_indices);
    }

    let scene = document.default_scene().or_else(|| document.scenes().next());
    let root = scene.map(|scene| {
        let mut root = SceneNode::new(scene.name().unwrap_or(name));
        root.children = scene
            .nodes()
            .map(|node| load_node(&node, &mesh_index_map))
            .collect();
        root
    });

    debug!(
        "decoded glTF {name}: {} mesh(es), root present: {}",
        meshes.len(),
        root.is_some()
    );
    Ok(SceneGraph { meshes, root })
}

fn load_node(node: &gltf::Node<'_>, mesh_index_map: &[Vec<usize>]) -> SceneNode {
    let name = node
        .name()
        .map(String::from)
        .unwrap_or_else(|| format!("node{}", node.index()));
    let meshes = node
        .mesh()
        .and_then(|mesh| mesh_index_map.get(mesh.index()))
        .cloned()
        .unwrap_or_default();

    let mut scene_node = SceneNode::new(name)
        .with_transform(Mat4::from_cols_array_2d(&node.transform().matrix()))
        .with_meshes(meshes);
    scene_node.children = node
        .children()
        .map(|child| load_node(&child, mesh_index_map))
        .collect();
    scene_node
}

fn load_primitive(
    label: &str,
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<Option<SourceMesh>> {
    let mode = primitive.mode();
    if !matches!(
        mode,
        Mode::Triangles | Mode::TriangleStrip | Mode::TriangleFan
    ) {
        return Ok(None);
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

    let positions: Vec<Vec3> = reader
        .read_positions()
        .ok_or_else(|| anyhow!("primitive {label} has no POSITION attribute"))?
        .map(Vec3::from_array)
        .collect();
    let normals: Option<Vec<Vec3>> = reader
        .read_normals()
        .map(|normals| normals.map(Vec3::from_array).collect());
    let tex_coords: Option<Vec<Vec2>> = reader.read_tex_coords(0).map(|coords| {
        coords
            .into_f32()
            .map(|[u, v]| Vec2::new(u, 1.0 - v))
            .collect()
    });

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };

    if normals.as_ref().is_some_and(|n| n.len() != positions.len())
        || tex_coords.as_ref().is_some_and(|t| t.len() != positions.len())
    {
        return Err(anyhow!(
            "primitive {label} has attribute streams of mismatched length"
        ));
    }

    Ok(Some(SourceMesh {
        name: label.to_string(),
        positions,
        normals,
        tex_coords,
        faces: assemble_triangles(mode, &indices),
    }))
}

/// Expands strips and fans into independent triangles.
fn assemble_triangles(mode: Mode, indices: &[u32]) -> Vec<Vec<u32>> {
    match mode {
        Mode::TriangleStrip => indices
            .windows(3)
            .enumerate()
            .map(|(i, w)| {
                if i % 2 == 0 {
                    vec![w[0], w[1], w[2]]
                } else {
                    vec![w[1], w[0], w[2]]
                }
            })
            .collect(),
        Mode::TriangleFan => match indices.split_first() {
            Some((&first, rest)) => rest
                .windows(2)
                .map(|w| vec![first, w[0], w[1]])
                .collect(),
            None => Vec::new(),
        },
        _ => indices.chunks(3).map(<[u32]>::to_vec).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_alternate_winding() {
        let faces = assemble_triangles(Mode::TriangleStrip, &[0, 1, 2, 3]);
        assert_eq!(faces, vec![vec![0, 1, 2], vec![2, 1, 3]]);
    }

    #[test]
    fn fans_share_first_vertex() {
        let faces = assemble_triangles(Mode::TriangleFan, &[0, 1, 2, 3]);
        assert_eq!(faces, vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn short_strip_yields_no_faces() {
        assert!(assemble_triangles(Mode::TriangleStrip, &[0, 1]).is_empty());
        assert!(assemble_triangles(Mode::TriangleFan, &[0, 1]).is_empty());
    }

    #[test]
    fn trailing_partial_triangle_is_kept_for_validation() {
        let faces = assemble_triangles(Mode::Triangles, &[0, 1, 2, 0, 2]);
        assert_eq!(faces.last().map(Vec::len), Some(2));
    }

    #[test]
    fn rejects_garbage() {
        assert!(load_gltf_from_slice("junk", b"not a gltf").is_err());
    }
}
