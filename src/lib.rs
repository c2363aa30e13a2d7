//! A small textured mesh viewer built on wgpu and winit.
//!
//! Importing, camera math and uniform preparation are plain data and can be
//! used without a GPU; [`render`] and [`app`] add the device and window on
//! top.

pub mod app;
pub mod camera;
pub mod error;
pub mod frame;
pub mod gltf_doc;
pub mod importer;
pub mod input;
pub mod mesh;
pub mod model;
pub mod obj;
pub mod render;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod texture;
pub mod uniform;
pub mod vertex;

pub use camera::{Camera, CameraSettings};
pub use error::{ImportError, MeshError, ResourceError, ShaderCompileError, ShaderStage, StartupError};
pub use frame::{FrameDriver, Lighting, ModelMotion, Projection, Viewport};
pub use importer::{import_model, import_model_from_bytes, ImportOptions, ModelData};
pub use input::{InputState, KeyCode, MouseTracker, NamedKey};
pub use mesh::{MeshBuffer, MeshData};
pub use model::Model;
pub use obj::load_obj_from_str;
pub use render::{Renderer, TextureSource};
pub use resources::ResourceStore;
pub use scene::{PostProcess, SceneFormat, SceneGraph, SceneNode, SourceMesh};
pub use shader::ShaderProgram;
pub use texture::Texture;
pub use uniform::{UniformBlock, UniformKind, UniformLayout, UniformTarget, UniformValue};
pub use vertex::Vertex;
