use log::{debug, info};

use crate::error::{ShaderCompileError, ShaderStage};
use crate::uniform::{UniformBlock, UniformKind, UniformLayout, UniformTarget, UniformValue};
use crate::vertex::Vertex;

/// Member names of the `Globals` uniform struct shared by both stages.
pub mod globals {
    use super::{UniformKind, UniformLayout};

    pub const MODEL: &str = "model";
    pub const VIEW: &str = "view";
    pub const PROJECTION: &str = "projection";
    pub const LIGHT_POSITION: &str = "light_position";
    pub const LIGHT_INTENSITY: &str = "light_intensity";
    pub const LIGHT_COLOR: &str = "light_color";
    pub const AMBIENT_STRENGTH: &str = "ambient_strength";
    pub const VIEW_POSITION: &str = "view_position";
    pub const SPECULAR_STRENGTH: &str = "specular_strength";

    /// Must match `struct Globals` in the WGSL sources.
    pub fn layout() -> UniformLayout {
        UniformLayout::new(&[
            (MODEL, UniformKind::Mat4),
            (VIEW, UniformKind::Mat4),
            (PROJECTION, UniformKind::Mat4),
            (LIGHT_POSITION, UniformKind::Vec3),
            (LIGHT_INTENSITY, UniformKind::Float),
            (LIGHT_COLOR, UniformKind::Vec3),
            (AMBIENT_STRENGTH, UniformKind::Float),
            (VIEW_POSITION, UniformKind::Vec3),
            (SPECULAR_STRENGTH, UniformKind::Float),
        ])
    }
}

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Compiled vertex+fragment pipeline and its uniform storage.
///
/// Bind group 0 holds the `Globals` uniform buffer, group 1 the texture
/// passed in by the caller.
#[derive(Debug)]
pub struct ShaderProgram {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: UniformBlock,
}

impl ShaderProgram {
    /// Compiles both stages and links them into a render pipeline.
    ///
    /// Validation errors are captured per stage so the message wgpu reports
    /// can be returned verbatim instead of aborting the process.
    pub fn compile(
        device: &wgpu::Device,
        vertex_source: &str,
        fragment_source: &str,
        color_format: wgpu::TextureFormat,
        texture_layout: &wgpu::BindGroupLayout,
    ) -> Result<Self, ShaderCompileError> {
        let vertex = compile_stage(device, ShaderStage::Vertex, vertex_source)?;
        let fragment = compile_stage(device, ShaderStage::Fragment, fragment_source)?;

        let uniforms = UniformBlock::new(globals::layout());
        let uniform_size = uniforms.layout().size() as u64;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(uniform_size),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout, texture_layout],
            push_constant_ranges: &[],
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("globals-uniform"),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals-bind-group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mesh-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some(VERTEX_ENTRY),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout()],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some(FRAGMENT_ENTRY),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderCompileError {
                stage: ShaderStage::Link,
                log: err.to_string(),
                source_code: None,
            });
        }

        info!("linked mesh pipeline ({uniform_size} byte globals)");
        Ok(Self {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
        })
    }

    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniforms
    }

    /// Uploads the uniform block if anything changed since the last flush.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if let Some(bytes) = self.uniforms.take_dirty() {
            queue.write_buffer(&self.uniform_buffer, 0, bytes);
        }
    }

    /// Activates the pipeline and its uniform bind group.
    pub fn bind(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
    }

    pub fn destroy(self) {
        self.uniform_buffer.destroy();
    }
}

impl UniformTarget for ShaderProgram {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.uniforms.set(name, value);
    }
}

fn compile_stage(
    device: &wgpu::Device,
    stage: ShaderStage,
    source: &str,
) -> Result<wgpu::ShaderModule, ShaderCompileError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(match stage {
            ShaderStage::Vertex => "mesh-vertex",
            ShaderStage::Fragment => "mesh-fragment",
            ShaderStage::Link => "mesh-program",
        }),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(ShaderCompileError {
            stage,
            log: err.to_string(),
            source_code: Some(source.to_string()),
        }),
        None => {
            debug!("compiled {stage} shader ({} bytes)", source.len());
            Ok(module)
        }
    }
}
