//! wgpu-based shader program: compilation, draw and readback.

use super::dialect;
use super::GpuContext;
use crate::config::ResolvedShaders;
use crate::error::{FrameError, FrameResult, ShaderStage};
use crate::frame::{self, FrameUniforms, QuadVertex, READBACK_CHANNELS};
use naga::front::glsl::{Frontend, Options};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use std::borrow::Cow;
use std::sync::mpsc;
use tracing::debug;
use wgpu::util::DeviceExt;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Both stages translated to WGSL.
#[derive(Debug, Clone)]
pub struct CompiledShaders {
    pub vertex_wgsl: String,
    pub fragment_wgsl: String,
}

impl CompiledShaders {
    /// Adapts and compiles both stages. Needs no GPU.
    pub fn compile(shaders: &ResolvedShaders) -> FrameResult<Self> {
        let vertex_wgsl = glsl_to_wgsl(&dialect::wrap_vertex(&shaders.vertex)?, ShaderStage::Vertex)?;
        let fragment_wgsl =
            glsl_to_wgsl(&dialect::wrap_fragment(&shaders.fragment), ShaderStage::Fragment)?;
        Ok(Self {
            vertex_wgsl,
            fragment_wgsl,
        })
    }
}

/// Compiled program plus the fixed resources it draws with.
pub struct ShaderProgram {
    gpu: GpuContext,
    render_pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    target_texture: wgpu::Texture,
    readback_buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_row_bytes: u32,
}

impl ShaderProgram {
    /// Creates the pipeline and allocates the target, quad and readback
    /// buffers for a `width`x`height` surface.
    pub fn new(gpu: GpuContext, width: u32, height: u32, shaders: CompiledShaders) -> Self {
        let CompiledShaders {
            vertex_wgsl,
            fragment_wgsl,
        } = shaders;
        let device = &gpu.device;

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(vertex_wgsl)),
        });
        let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fragment Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(fragment_wgsl)),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Uniforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Vertex Buffer"),
            contents: bytemuck::cast_slice(QuadVertex::VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(QuadVertex::INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let uniforms = FrameUniforms::new(width, height, 0.0, 0.0, 1.0);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Uniforms Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let target_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let padded_row_bytes = padded_bytes_per_row(width);
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: padded_row_bytes as wgpu::BufferAddress * height as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            gpu,
            render_pipeline,
            vertex_buffer,
            index_buffer,
            uniform_buffer,
            bind_group,
            target_texture,
            readback_buffer,
            width,
            height,
            padded_row_bytes,
        }
    }

    /// Draws the quad with `uniforms` and returns the target as tightly
    /// packed RGBA rows, bottom row first.
    pub fn draw(&self, uniforms: &FrameUniforms) -> FrameResult<Vec<u8>> {
        let start = std::time::Instant::now();
        let device = &self.gpu.device;
        let queue = &self.gpu.queue;

        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[*uniforms]));

        let target_view = self
            .target_texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..QuadVertex::INDICES.len() as u32, 0, 0..1);
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_row_bytes),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = self.readback_buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let poll = device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        });
        wait_for_map(&self.readback_buffer, poll, &receiver)?;

        let data = buffer_slice.get_mapped_range();
        let pixels = frame::strip_row_padding(&data, self.width, self.height, self.padded_row_bytes as usize);
        drop(data);
        self.readback_buffer.unmap();

        debug!("  [Perf] Draw + readback: {:?}", start.elapsed());
        Ok(pixels)
    }
}

/// Finishes a `map_async` request on `buffer` once the device poll returned.
///
/// A failed poll leaves the request pending, so it is cancelled here and the
/// buffer can be mapped again by the next frame.
fn wait_for_map(
    buffer: &wgpu::Buffer,
    poll: Result<wgpu::PollStatus, wgpu::PollError>,
    receiver: &mpsc::Receiver<Result<(), wgpu::BufferAsyncError>>,
) -> FrameResult<()> {
    if let Err(e) = poll {
        buffer.unmap();
        return Err(FrameError::Readback(format!("device poll failed: {}", e)));
    }
    receiver
        .recv()
        .map_err(|_| FrameError::Readback("map callback was dropped".into()))?
        .map_err(|e| FrameError::Readback(format!("buffer map failed: {}", e)))
}

/// Row pitch of the readback buffer, rounded up to the copy alignment.
fn padded_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let unpadded = width * READBACK_CHANNELS as u32;
    unpadded.div_ceil(align) * align
}

/// Converts a GLSL 450 stage to WGSL, reporting parse and validation errors
/// as compilation failures.
fn glsl_to_wgsl(glsl: &str, stage: ShaderStage) -> FrameResult<String> {
    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };

    let mut frontend = Frontend::default();
    let options = Options::from(naga_stage);
    let module = frontend
        .parse(&options, glsl)
        .map_err(|e| FrameError::compilation(stage, e.emit_to_string(glsl)))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    let info = validator
        .validate(&module)
        .map_err(|e| FrameError::compilation(stage, e.emit_to_string(glsl)))?;

    naga::back::wgsl::write_string(&module, &info, naga::back::wgsl::WriterFlags::empty())
        .map_err(|e| FrameError::compilation(stage, format!("WGSL generation error: {:?}", e)))
}
