use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::Builder;

const CUBE: &str = include_str!("../assets/models/cube.obj");

#[test]
fn summary_only_reports_model_statistics() {
    let mut model = Builder::new().suffix(".obj").tempfile().expect("temp model");
    model.write_all(CUBE.as_bytes()).expect("write model");

    let mut cmd = Command::cargo_bin("mesh-viewer").expect("binary exists");
    cmd.arg(model.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("1 mesh(es), 24 vertices, 12 triangles"))
        .stdout(contains(" - cube: 24 vertices, 36 indices"));
}

#[test]
fn summary_only_without_model_uses_bundled_cube() {
    let mut cmd = Command::cargo_bin("mesh-viewer").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("models/cube.obj"))
        .stdout(contains(" - cube: 24 vertices, 36 indices"));
}

#[test]
fn unsupported_extension_fails() {
    let model = Builder::new().suffix(".fbx").tempfile().expect("temp model");

    let mut cmd = Command::cargo_bin("mesh-viewer").expect("binary exists");
    cmd.arg(model.path()).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("unsupported model format"));
}

#[test]
fn unknown_flag_fails() {
    let mut cmd = Command::cargo_bin("mesh-viewer").expect("binary exists");
    cmd.arg("--wireframe");
    cmd.assert().failure().stderr(contains("Unknown argument: --wireframe"));
}
