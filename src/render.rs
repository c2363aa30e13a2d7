use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::camera::Camera;
use crate::error::StartupError;
use crate::frame::{FrameDriver, Viewport};
use crate::model::Model;
use crate::resources::{ResourceStore, DEFAULT_TEXTURE, FRAGMENT_SHADER, VERTEX_SHADER};
use crate::shader::{ShaderProgram, DEPTH_FORMAT};
use crate::texture::{self, Texture};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.03,
    g: 0.03,
    b: 0.05,
    a: 1.0,
};

/// Which image to sample and whether to flip it before upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSource {
    pub name: String,
    pub flip_vertically: bool,
}

impl Default for TextureSource {
    fn default() -> Self {
        Self {
            name: DEFAULT_TEXTURE.to_string(),
            // wgpu samples from the top-left and imported UVs are already
            // flipped to match, so the image goes up as stored.
            flip_vertically: false,
        }
    }
}

/// Window surface plus the program and texture used to draw a model.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    program: ShaderProgram,
    texture: Texture,
}

impl Renderer {
    /// Initializes the GPU for `window` and compiles the mesh program.
    pub async fn new(
        window: Arc<Window>,
        resources: &ResourceStore,
        texture_source: &TextureSource,
    ) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        let adapter_info = adapter.get_info();
        info!(
            "using adapter {} ({:?} backend)",
            adapter_info.name, adapter_info.backend
        );

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("viewer-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let texture_layout = Texture::bind_group_layout(&device);
        let program = load_program(&device, resources, surface_format, &texture_layout)?;
        let texture = load_texture(&device, &queue, resources, &texture_layout, texture_source)?;

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            program,
            texture,
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Reconfigures the swap chain and depth target for the new size.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Clears, binds the program and texture, uploads the frame's uniforms
    /// and draws every mesh of `model`.
    pub fn render(
        &mut self,
        model: &Model,
        frame: &FrameDriver,
        camera: &Camera,
        viewport: &Viewport,
        elapsed_seconds: f32,
    ) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.program.bind(&mut pass);
            self.texture.bind(&mut pass, 1);

            frame.prepare(camera, viewport, elapsed_seconds, &mut self.program);
            self.program.flush(&self.queue);

            model.draw(&mut pass);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }

    /// Releases the program and texture, then the surface and device.
    pub fn shutdown(self) {
        self.program.destroy();
        self.texture.destroy();
    }
}

fn load_program(
    device: &wgpu::Device,
    resources: &ResourceStore,
    color_format: wgpu::TextureFormat,
    texture_layout: &wgpu::BindGroupLayout,
) -> Result<ShaderProgram, StartupError> {
    let vertex_source = resources.get_text(VERTEX_SHADER)?;
    let fragment_source = resources.get_text(FRAGMENT_SHADER)?;
    Ok(ShaderProgram::compile(
        device,
        &vertex_source,
        &fragment_source,
        color_format,
        texture_layout,
    )?)
}

fn load_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    resources: &ResourceStore,
    layout: &wgpu::BindGroupLayout,
    source: &TextureSource,
) -> Result<Texture, StartupError> {
    let bytes = resources.get(&source.name)?;
    let image = texture::decode_rgba(&source.name, &bytes, source.flip_vertically)?;
    Ok(Texture::upload(device, queue, layout, &source.name, &image))
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
