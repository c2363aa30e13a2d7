//! Startup error taxonomy.
//!
//! Every failure here happens while loading; once the frame loop is running
//! there are no recoverable error paths.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn a scene file into a model.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unsupported model format for {path}")]
    UnsupportedFormat { path: PathBuf },
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("scene {path} is incomplete (no meshes)")]
    Incomplete { path: PathBuf },
    #[error("scene {path} has no root node")]
    MissingRoot { path: PathBuf },
    #[error("node {node:?} references mesh {mesh} but the scene has {available}")]
    DanglingMesh {
        node: String,
        mesh: usize,
        available: usize,
    },
    #[error("mesh {mesh} of {path} is invalid")]
    InvalidMesh {
        path: PathBuf,
        mesh: usize,
        #[source]
        source: MeshError,
    },
}

/// Violation of the triangle-list invariants of a mesh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("face {face} has {count} indices; only triangles are supported")]
    NonTriangularFace { face: usize, count: usize },
    #[error("index count {0} is not a multiple of 3")]
    PartialTriangle(usize),
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
}

/// Pipeline stage that produced a shader error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Link,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Link => "link",
        })
    }
}

/// Compile or link failure, carrying the driver's log verbatim.
#[derive(Debug, Error)]
#[error("{stage} shader error: {log}")]
pub struct ShaderCompileError {
    pub stage: ShaderStage,
    pub log: String,
    pub source_code: Option<String>,
}

/// Failure to look up a named resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource not found: {name}")]
    NotFound { name: String },
    #[error("failed to read resource {name}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("resource {name} is not valid UTF-8")]
    NotUtf8 { name: String },
    #[error("failed to decode image {name}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

/// Any fatal error raised before the frame loop starts.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Shader(#[from] ShaderCompileError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}
