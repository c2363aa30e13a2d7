use std::fs;
use std::path::Path;

use glam::Vec3;
use mesh_viewer::{import_model, ImportError, ImportOptions, ModelData};
use tempfile::{tempdir, Builder};

const CUBE: &str = include_str!("../assets/models/cube.obj");

fn write_obj(contents: &str) -> tempfile::NamedTempFile {
    let file = Builder::new().suffix(".obj").tempfile().unwrap();
    fs::write(file.path(), contents).unwrap();
    file
}

fn assert_indices_valid(model: &ModelData) {
    for mesh in &model.meshes {
        assert_eq!(mesh.indices.len() % 3, 0, "{}", mesh.name);
        assert!(
            mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()),
            "{} has an out of range index",
            mesh.name
        );
    }
}

#[test]
fn cube_imports_as_single_mesh() {
    let file = write_obj(CUBE);
    let model = import_model(file.path(), ImportOptions::default()).unwrap();

    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.meshes[0].name, "cube");
    assert_eq!(model.meshes[0].vertices.len(), 24);
    assert_eq!(model.meshes[0].indices.len(), 36);
    assert_eq!(model.triangle_count(), 12);
    assert_indices_valid(&model);
}

#[test]
fn reimport_is_deterministic() {
    let file = write_obj(CUBE);
    let first = import_model(file.path(), ImportOptions::default()).unwrap();
    let second = import_model(file.path(), ImportOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn each_obj_group_becomes_a_mesh() {
    let file = write_obj(
        "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\n\
         o left\nf 1 2 3\n\
         o right\nf 2 4 3\n\
         o both\nf 1 2 4 3\n",
    );
    let model = import_model(file.path(), ImportOptions::default()).unwrap();

    let names: Vec<_> = model.meshes.iter().map(|mesh| mesh.name.as_str()).collect();
    assert_eq!(names, ["left", "right", "both"]);
    assert_eq!(model.meshes[2].indices.len(), 6);
    assert_indices_valid(&model);
}

#[test]
fn missing_file_is_a_decode_error() {
    let dir = tempdir().unwrap();
    let err = import_model(dir.path().join("absent.obj"), ImportOptions::default()).unwrap_err();
    assert!(matches!(err, ImportError::Decode { .. }), "{err}");
}

fn write_gltf(dir: &Path) -> std::path::PathBuf {
    let mut bin = Vec::new();
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    for index in [0u16, 1, 2] {
        bin.extend_from_slice(&index.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);
    fs::write(dir.join("tri.bin"), &bin).unwrap();

    let json = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0] }],
  "nodes": [
    { "name": "root", "mesh": 0, "children": [1] },
    { "name": "child", "mesh": 0, "translation": [5.0, 0.0, 0.0] }
  ],
  "meshes": [{ "name": "tri", "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
  "buffers": [{ "uri": "tri.bin", "byteLength": 44 }],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
  ]
}"#;
    let path = dir.join("scene.gltf");
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn gltf_mesh_is_emitted_once_per_reference() {
    let dir = tempdir().unwrap();
    let path = write_gltf(dir.path());
    let model = import_model(&path, ImportOptions::default()).unwrap();

    assert_eq!(model.meshes.len(), 2);
    assert_eq!(model.meshes[0], model.meshes[1]);
    assert_eq!(model.meshes[1].vertices[1].position(), Vec3::new(1.0, 0.0, 0.0));
    assert_indices_valid(&model);
}

#[test]
fn gltf_node_transforms_can_be_baked() {
    let dir = tempdir().unwrap();
    let path = write_gltf(dir.path());
    let options = ImportOptions {
        bake_node_transforms: true,
        ..ImportOptions::default()
    };
    let model = import_model(&path, options).unwrap();

    assert_eq!(model.meshes[0].vertices[1].position(), Vec3::new(1.0, 0.0, 0.0));
    assert_eq!(model.meshes[1].vertices[1].position(), Vec3::new(6.0, 0.0, 0.0));
}
