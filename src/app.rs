//! Viewer session and window event loop.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{error, info, warn};
use pollster::block_on;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::camera::{Camera, CameraSettings};
use crate::frame::{FrameDriver, Lighting, ModelMotion, Projection, Viewport};
use crate::importer::{self, ImportOptions, ModelData};
use crate::input::{InputState, KeyCode, MouseTracker};
use crate::model::Model;
use crate::render::{Renderer, TextureSource};
use crate::resources::{ResourceStore, DEFAULT_MODEL};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Mesh Viewer".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Everything needed to start a viewer session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Model file to open; the bundled cube when unset.
    pub model: Option<PathBuf>,
    /// Directory whose files shadow the embedded resources.
    pub assets: Option<PathBuf>,
    /// Image file to use instead of the `texture` resource.
    pub texture_file: Option<PathBuf>,
    pub texture: TextureSource,
    pub import: ImportOptions,
    pub window: WindowSettings,
    pub camera: CameraSettings,
    pub projection: Projection,
    pub lighting: Lighting,
    pub motion: ModelMotion,
}

impl ViewerConfig {
    /// Builds the resource store: embedded assets, then the asset directory,
    /// then an explicit texture file.
    pub fn resources(&self) -> Result<ResourceStore> {
        let mut store = ResourceStore::embedded();
        if let Some(dir) = &self.assets {
            store = store.with_directory(dir);
        }
        if let Some(path) = &self.texture_file {
            let bytes = std::fs::read(path)
                .with_context(|| format!("unable to read texture {}", path.display()))?;
            store = store.with_entry(self.texture.name.clone(), bytes);
        }
        Ok(store)
    }

    pub fn frame_driver(&self) -> FrameDriver {
        FrameDriver::new(self.projection, self.lighting, self.motion)
    }
}

/// Command line options.
#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub config: ViewerConfig,
    pub summary_only: bool,
}

pub const USAGE: &str = "Usage: mesh-viewer [MODEL] [--texture PATH] [--assets DIR] [--spin] \
[--bake-transforms] [--summary-only] [--size WxH]";

impl CliOptions {
    pub fn parse() -> Result<Self> {
        Self::parse_from(std::env::args().skip(1))
    }

    pub fn parse_from(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut config = ViewerConfig::default();
        let mut summary_only = false;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--spin" => config.motion = ModelMotion::Spin,
                "--bake-transforms" => config.import.bake_node_transforms = true,
                "--texture" => {
                    let path = PathBuf::from(expect_value(&mut args, "--texture")?);
                    config.texture.name = path.to_string_lossy().into_owned();
                    config.texture_file = Some(path);
                }
                "--assets" => config.assets = Some(PathBuf::from(expect_value(&mut args, "--assets")?)),
                "--size" => {
                    let value = expect_value(&mut args, "--size")?;
                    let (width, height) = parse_size(&value)
                        .ok_or_else(|| anyhow!("invalid --size {value:?}, expected WIDTHxHEIGHT"))?;
                    config.window.width = width;
                    config.window.height = height;
                }
                "-h" | "--help" => return Err(anyhow!(USAGE)),
                other if other.starts_with('-') => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
                other => {
                    if config.model.is_some() {
                        return Err(anyhow!("Only one model may be given. {USAGE}"));
                    }
                    config.model = Some(PathBuf::from(other));
                }
            }
        }
        Ok(Self {
            config,
            summary_only,
        })
    }
}

fn expect_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
}

fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (width, height) = value.split_once(['x', 'X'])?;
    let width = width.trim().parse::<u32>().ok()?;
    let height = height.trim().parse::<u32>().ok()?;
    (width > 0 && height > 0).then_some((width, height))
}

/// Imports the configured model, or the bundled cube.
pub fn load_model_data(config: &ViewerConfig, resources: &ResourceStore) -> Result<ModelData> {
    let model = match &config.model {
        Some(path) => importer::import_model(path, config.import)
            .with_context(|| format!("failed to import {}", path.display()))?,
        None => {
            let bytes = resources.get(DEFAULT_MODEL)?;
            importer::import_model_from_bytes(DEFAULT_MODEL, &bytes, config.import)?
        }
    };
    Ok(model)
}

pub fn print_summary(model: &ModelData) {
    println!(
        "Loaded {} with {} mesh(es), {} vertices, {} triangles",
        model.source.display(),
        model.meshes.len(),
        model.vertex_count(),
        model.triangle_count()
    );
    for mesh in &model.meshes {
        println!(
            " - {}: {} vertices, {} indices",
            mesh.name,
            mesh.vertices.len(),
            mesh.indices.len()
        );
    }
}

/// Imports the model, prints its summary and, unless `summary_only`, opens
/// the viewer window. Falls back to the summary when no window can be made.
pub fn run(options: CliOptions) -> Result<()> {
    let resources = options.config.resources()?;
    let model = load_model_data(&options.config, &resources)?;
    print_summary(&model);

    if options.summary_only {
        return Ok(());
    }

    match run_interactive(options.config, resources, model) {
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or WAYLAND_DISPLAY to enable rendering)."
            );
            Ok(())
        }
        other => other,
    }
}

fn run_interactive(config: ViewerConfig, resources: ResourceStore, model: ModelData) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::new("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(config, resources, model);
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;
    app.finish()
}

/// Raised when the platform cannot give us a window.
#[derive(Debug, Error)]
#[error("failed to initialize {stage}: {message}")]
pub struct WindowInitError {
    stage: &'static str,
    message: String,
}

impl WindowInitError {
    fn new(stage: &'static str, err: impl std::fmt::Display) -> Self {
        Self {
            stage,
            message: err.to_string(),
        }
    }

    fn from_panic(stage: &'static str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            stage,
            message: panic_message(panic),
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

/// State owned by one open viewer window.
///
/// Fields are declared in teardown order.
pub struct Session {
    model: Model,
    renderer: Renderer,
    input: InputState,
    mouse: MouseTracker,
    focused: bool,
    camera: Camera,
    viewport: Viewport,
    frame: FrameDriver,
    started: Instant,
    last_frame: Instant,
}

impl Session {
    pub fn new(renderer: Renderer, model: Model, config: &ViewerConfig) -> Self {
        let size = renderer.window().inner_size();
        let now = Instant::now();
        Self {
            model,
            renderer,
            input: InputState::new(),
            mouse: MouseTracker::new(),
            focused: true,
            camera: Camera::from_settings(config.camera),
            viewport: Viewport::new(size.width, size.height),
            frame: config.frame_driver(),
            started: now,
            last_frame: now,
        }
    }

    pub fn window_id(&self) -> WindowId {
        self.renderer.window_id()
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if self.viewport.resize(size.width, size.height) {
            self.renderer.resize(size);
        }
    }

    /// Returns `true` when the key asks to close the viewer.
    pub fn handle_key(&mut self, key: KeyCode, state: ElementState) -> bool {
        match state {
            ElementState::Pressed => {
                self.input.set_key_down(key);
                key == KeyCode::QUIT
            }
            ElementState::Released => {
                self.input.set_key_up(key);
                false
            }
        }
    }

    /// Applies raw mouse motion while the window has focus.
    pub fn handle_mouse_motion(&mut self, delta: Vec2) {
        if !self.focused {
            return;
        }
        if let Some(offset) = self.mouse.motion(delta) {
            self.camera.look(offset.x, offset.y);
        }
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        if !focused {
            self.input.clear();
            self.mouse.reset();
        }
    }

    /// Advances the camera and draws one frame.
    pub fn redraw(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;
        self.camera.move_by(self.input.movement_direction(), dt);

        let elapsed = (now - self.started).as_secs_f32();
        match self
            .renderer
            .render(&self.model, &self.frame, &self.camera, &self.viewport, elapsed)
        {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.renderer.window().inner_size();
                self.renderer.resize(size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(anyhow!("GPU is out of memory"));
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; retrying next frame");
            }
            Err(err) => {
                error!("surface error: {err}");
            }
        }
        Ok(())
    }

    pub fn request_redraw(&self) {
        self.renderer.window().request_redraw();
    }

    /// Releases the model, then the renderer, then the input context.
    pub fn shutdown(self) {
        let Session {
            model,
            renderer,
            input,
            ..
        } = self;
        model.release();
        renderer.shutdown();
        drop(input);
        info!("viewer session closed");
    }
}

struct ViewerApp {
    config: ViewerConfig,
    resources: ResourceStore,
    pending: Option<ModelData>,
    session: Option<Session>,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(config: ViewerConfig, resources: ResourceStore, model: ModelData) -> Self {
        Self {
            config,
            resources,
            pending: Some(model),
            session: None,
            error: None,
        }
    }

    fn start_session(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let settings = &self.config.window;
        let attributes = Window::default_attributes()
            .with_title(settings.title.clone())
            .with_inner_size(LogicalSize::new(settings.width, settings.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::new("window", err))?,
        );

        let renderer = block_on(Renderer::new(
            Arc::clone(&window),
            &self.resources,
            &self.config.texture,
        ))?;
        let data = self
            .pending
            .take()
            .ok_or_else(|| anyhow!("model was already uploaded"))?;
        let model = Model::upload(renderer.device(), &data);

        if let Err(err) = window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        {
            warn!("unable to grab the cursor: {err}");
        }
        window.set_cursor_visible(false);

        self.session = Some(Session::new(renderer, model, &self.config));
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.error = Some(err);
        event_loop.exit();
    }

    fn finish(mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.shutdown();
        }
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() || self.error.is_some() {
            return;
        }
        if let Err(err) = self.start_session(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if window_id != session.window_id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => session.resize(size),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(key) = map_keycode(code) {
                    if session.handle_key(key, state) {
                        event_loop.exit();
                    }
                }
            }
            WindowEvent::Focused(focused) => session.set_focused(focused),
            WindowEvent::RedrawRequested => {
                if let Err(err) = session.redraw() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let (Some(session), DeviceEvent::MouseMotion { delta }) = (self.session.as_mut(), event) {
            session.handle_mouse_motion(Vec2::new(delta.0 as f32, delta.1 as f32));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = &self.session {
            session.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.take() {
            session.shutdown();
        }
    }
}

fn map_keycode(code: WinitKey) -> Option<KeyCode> {
    Some(match code {
        WinitKey::KeyW => KeyCode::FORWARD,
        WinitKey::KeyS => KeyCode::BACK,
        WinitKey::KeyA => KeyCode::LEFT,
        WinitKey::KeyD => KeyCode::RIGHT,
        WinitKey::Space => KeyCode::UP,
        WinitKey::ShiftLeft => KeyCode::DOWN,
        WinitKey::ShiftRight => KeyCode::DOWN_ALT,
        WinitKey::Escape => KeyCode::QUIT,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn defaults_open_bundled_cube() {
        let options = CliOptions::parse_from(Vec::new()).unwrap();
        assert!(!options.summary_only);
        assert_eq!(options.config, ViewerConfig::default());
        assert_eq!(options.config.camera.movement_speed, 2.5);
        assert_eq!(options.config.projection.fov_y_degrees, 45.0);
    }

    #[test]
    fn parses_all_flags() {
        let options = CliOptions::parse_from(args(&[
            "scene.gltf",
            "--spin",
            "--bake-transforms",
            "--summary-only",
            "--size",
            "1920x1080",
            "--assets",
            "assets",
            "--texture",
            "wood.png",
        ]))
        .unwrap();
        let config = &options.config;
        assert!(options.summary_only);
        assert_eq!(config.model, Some(PathBuf::from("scene.gltf")));
        assert_eq!(config.motion, ModelMotion::Spin);
        assert!(config.import.bake_node_transforms);
        assert_eq!((config.window.width, config.window.height), (1920, 1080));
        assert_eq!(config.assets, Some(PathBuf::from("assets")));
        assert_eq!(config.texture.name, "wood.png");
        assert_eq!(config.texture_file, Some(PathBuf::from("wood.png")));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(CliOptions::parse_from(args(&["--frobnicate"])).is_err());
        assert!(CliOptions::parse_from(args(&["a.obj", "b.obj"])).is_err());
        assert!(CliOptions::parse_from(args(&["--size", "wide"])).is_err());
        assert!(CliOptions::parse_from(args(&["--texture"])).is_err());
    }

    #[test]
    fn size_parser_requires_positive_dimensions() {
        assert_eq!(parse_size("640x480"), Some((640, 480)));
        assert_eq!(parse_size("640X480"), Some((640, 480)));
        assert_eq!(parse_size("0x480"), None);
        assert_eq!(parse_size("640"), None);
    }

    #[test]
    fn bundled_model_loads_without_a_path() {
        let config = ViewerConfig::default();
        let model = load_model_data(&config, &config.resources().unwrap()).unwrap();
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.meshes[0].indices.len(), 36);
        assert_eq!(model.meshes[0].vertices.len(), 24);
    }

    #[test]
    fn wasd_keys_map_to_movement() {
        assert_eq!(map_keycode(WinitKey::KeyW), Some(KeyCode::FORWARD));
        assert_eq!(map_keycode(WinitKey::ShiftLeft), Some(KeyCode::DOWN));
        assert_eq!(map_keycode(WinitKey::ShiftRight), Some(KeyCode::DOWN_ALT));
        assert_eq!(map_keycode(WinitKey::Escape), Some(KeyCode::QUIT));
        assert_eq!(map_keycode(WinitKey::KeyQ), None);
        assert_eq!(map_keycode(WinitKey::Enter), None);
        assert_eq!(map_keycode(WinitKey::F1), None);
    }
}
