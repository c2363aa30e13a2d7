use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use log::warn;

use crate::scene::{SceneGraph, SceneNode, SourceMesh};

/// Parses a Wavefront OBJ file from memory into a scene graph.
///
/// Every `o`/`g` group becomes its own mesh under a child node of the root.
/// Vertices are shared within a group when they reference the same
/// position/texcoord/normal triple. Polygons are left as-is; triangulation
/// is a post-processing step.
pub fn load_obj_from_str(name: &str, data: &str) -> Result<SceneGraph> {
    let mut positions = Vec::new();
    let mut tex_coords = Vec::new();
    let mut normals = Vec::new();
    let mut groups = vec![Group::new(name)];

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vt" => tex_coords.push(
                parse_vec2(parts)
                    .with_context(|| format!("invalid texture coordinate on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                if let Some(group) = groups.last_mut() {
                    group.faces.push(polygon);
                }
            }
            "o" | "g" => {
                let group_name = parts.collect::<Vec<_>>().join(" ");
                let group_name = if group_name.is_empty() {
                    format!("{name}-{}", groups.len())
                } else {
                    group_name
                };
                groups.push(Group::new(&group_name));
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    let channels = Channels {
        positions: &positions,
        tex_coords: &tex_coords,
        normals: &normals,
    };

    let mut root = SceneNode::new(name);
    let mut meshes = Vec::new();
    for group in groups {
        if group.faces.is_empty() {
            continue;
        }
        let mesh = build_mesh(&group, &channels)
            .with_context(|| format!("invalid geometry in group {}", group.name))?;
        root.children
            .push(SceneNode::new(group.name.clone()).with_meshes([meshes.len()]));
        meshes.push(mesh);
    }

    if meshes.is_empty() {
        warn!("OBJ file {name} defines vertices but no faces");
    }

    Ok(SceneGraph {
        meshes,
        root: Some(root),
    })
}

struct Group {
    name: String,
    faces: Vec<Vec<FaceIndex>>,
}

impl Group {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            faces: Vec::new(),
        }
    }
}

struct Channels<'a> {
    positions: &'a [Vec3],
    tex_coords: &'a [Vec2],
    normals: &'a [Vec3],
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let x = next_component(&mut parts)?;
    let y = next_component(&mut parts)?;
    let z = next_component(&mut parts)?;
    Ok(Vec3::new(x, y, z))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let u = next_component(&mut parts)?;
    // `vt u` is legal; v defaults to zero.
    let v = match parts.next() {
        Some(value) => value.parse::<f32>()?,
        None => 0.0,
    };
    Ok(Vec2::new(u, v))
}

fn next_component<'a>(parts: &mut impl Iterator<Item = &'a str>) -> Result<f32> {
    Ok(parts
        .next()
        .ok_or_else(|| anyhow!("missing vector component"))?
        .parse::<f32>()?)
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = parse_optional_index(segments.next())?;
        let vn = parse_optional_index(segments.next())?;
        indices.push(FaceIndex { v, vt, vn });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn parse_optional_index(segment: Option<&str>) -> Result<i32> {
    match segment {
        None | Some("") => Ok(0),
        Some(value) => Ok(value.parse::<i32>()?),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    tex_coord: Option<usize>,
    normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
    vn: i32,
}

fn build_mesh(group: &Group, channels: &Channels<'_>) -> Result<SourceMesh> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut positions = Vec::new();
    let mut tex_coords = Vec::new();
    let mut normals = Vec::new();
    let mut faces = Vec::with_capacity(group.faces.len());
    let mut any_tex_coord = false;
    let mut any_normal = false;

    for polygon in &group.faces {
        let mut face = Vec::with_capacity(polygon.len());
        for idx in polygon {
            let position = fix_index(idx.v, channels.positions.len())
                .ok_or_else(|| anyhow!("invalid vertex index {}", idx.v))?;
            let key = Key {
                position,
                tex_coord: fix_index(idx.vt, channels.tex_coords.len()),
                normal: fix_index(idx.vn, channels.normals.len()),
            };
            let next_index = positions.len() as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                positions.push(channels.positions[key.position]);
                tex_coords.push(key.tex_coord.map(|i| channels.tex_coords[i]).unwrap_or(Vec2::ZERO));
                normals.push(key.normal.map(|i| channels.normals[i]).unwrap_or(Vec3::ZERO));
                next_index
            });
            any_tex_coord |= key.tex_coord.is_some();
            any_normal |= key.normal.is_some();
            face.push(*entry);
        }
        faces.push(face);
    }

    Ok(SourceMesh {
        name: group.name.clone(),
        positions,
        normals: any_normal.then_some(normals),
        tex_coords: any_tex_coord.then_some(tex_coords),
        faces,
    })
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE: &str = "
v -0.5 -0.5  0.5
v  0.5 -0.5  0.5
v  0.5  0.5  0.5
v -0.5  0.5  0.5
v -0.5 -0.5 -0.5
v  0.5 -0.5 -0.5
v  0.5  0.5 -0.5
v -0.5  0.5 -0.5
f 1 2 3 4
f 6 5 8 7
f 5 1 4 8
f 2 6 7 3
f 4 3 7 8
f 5 6 2 1
";

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let scene = load_obj_from_str("tri", obj).unwrap();
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.meshes[0].faces, vec![vec![0, 1, 2]]);
        assert!(scene.meshes[0].normals.is_none());
        assert!(scene.meshes[0].tex_coords.is_none());
    }

    #[test]
    fn shares_positions_across_quads() {
        let scene = load_obj_from_str("cube", CUBE).unwrap();
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.positions.len(), 8);
        assert_eq!(mesh.faces.len(), 6);
        assert!(mesh.faces.iter().all(|face| face.len() == 4));
    }

    #[test]
    fn splits_texcoord_seams() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvt 1 1\n\
                   f 1/1 2/2 3/3\nf 1/4 3/3 2/2\n";
        let mesh = &load_obj_from_str("seam", obj).unwrap().meshes[0];
        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.tex_coords.as_ref().unwrap()[3], Vec2::new(1.0, 1.0));
    }

    #[test]
    fn groups_become_child_nodes() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\no first\nf 1 2 3\ng second\nf -3 -2 -1\ng empty\n";
        let scene = load_obj_from_str("groups", obj).unwrap();
        let root = scene.root.unwrap();
        let names: Vec<_> = root.children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(root.children[1].mesh_indices, vec![1]);
        assert_eq!(scene.meshes[1].faces, vec![vec![0, 1, 2]]);
    }

    #[test]
    fn reads_normals_with_empty_texcoord_slot() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";
        let mesh = &load_obj_from_str("n", obj).unwrap().meshes[0];
        assert_eq!(mesh.normals.as_ref().unwrap(), &vec![Vec3::Z; 3]);
        assert!(mesh.tex_coords.is_none());
    }

    #[test]
    fn rejects_out_of_range_index() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        assert!(load_obj_from_str("bad", obj).is_err());
    }

    #[test]
    fn rejects_file_without_vertices() {
        assert!(load_obj_from_str("empty", "# nothing here\n").is_err());
    }
}
