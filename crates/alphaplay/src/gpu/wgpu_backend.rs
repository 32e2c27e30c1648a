use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    Buffer, BufferBindingType, ColorTargetState, CommandEncoder, Device, FragmentState,
    MultisampleState, PipelineCompilationOptions, PipelineLayoutDescriptor, PrimitiveState,
    PrimitiveTopology, Queue, RenderPipeline, Sampler, SamplerBindingType, ShaderModule,
    ShaderStages, SurfaceError, Texture, TextureFormat, TextureSampleType, TextureView,
    TextureViewDimension, VertexAttribute, VertexBufferLayout, VertexState,
};

use super::context::{GpuContext, output_premultiplied};
use super::pipeline::{ProgramDesc, RenderBackend};
use super::uniforms::{QuadUniforms, UniformBuffer};
use super::viewport::{Viewport, fit_viewport};
use crate::error::{PlayerError, Result};
use crate::media::{FrameView, PixelFormat};

const POSITION_ATTRS: [VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const TEX_COORD_ATTRS: [VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];

/// Frames are sampled as raw bytes: a mask byte of 128 must read back as 128/255.
pub const FRAME_TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

/// Texture holding the most recent frame, recreated when the frame size changes.
struct FrameTexture {
    texture: Texture,
    bind_group: BindGroup,
    width: u32,
    height: u32,
}

/// Compiled pipeline plus the buffers and frame texture it draws from.
struct Program {
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    position_buffer: Buffer,
    tex_coord_buffer: Buffer,
    uniform_buffer: UniformBuffer,
    sampler: Sampler,
    frame: Option<FrameTexture>,
}

impl Program {
    fn new(
        device: &Device,
        queue: &Queue,
        format: TextureFormat,
        desc: &ProgramDesc<'_>,
    ) -> Result<Self> {
        // wgpu defers shader validation to pipeline creation; scope both so the
        // naga diagnostic comes back here instead of the uncaptured-error handler.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("alphaplay-shader"),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });
        let bind_group_layout = create_bind_group_layout(device);
        let pipeline = create_pipeline(device, format, &bind_group_layout, &shader_module);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            log::error!("Shader compilation failed: {err}");
            return Err(PlayerError::ShaderCompile(err.to_string()));
        }

        let position_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("alphaplay-positions"),
            contents: bytemuck::cast_slice(&desc.positions[..]),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let tex_coord_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("alphaplay-tex-coords"),
            contents: bytemuck::cast_slice(&desc.tex_coords[..]),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let uniform_buffer = UniformBuffer::new(device);
        uniform_buffer.update(queue, &desc.uniforms);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("alphaplay-frame-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        Ok(Self {
            pipeline,
            bind_group_layout,
            position_buffer,
            tex_coord_buffer,
            uniform_buffer,
            sampler,
            frame: None,
        })
    }

    /// Copy `frame` into the frame texture, recreating it on a size change.
    fn upload_frame(
        &mut self,
        device: &Device,
        queue: &Queue,
        frame: &FrameView<'_>,
        staging: &mut Vec<u8>,
    ) {
        let needs_texture = self
            .frame
            .as_ref()
            .is_none_or(|f| f.width != frame.width || f.height != frame.height);
        if needs_texture {
            self.frame = Some(create_frame_texture(device, self, frame.width, frame.height));
        }
        let Some(frame_texture) = self.frame.as_ref() else {
            return;
        };

        pack_rgba_flipped(frame, staging);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &frame_texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            staging.as_slice(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.width * 4),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Clear `target` to transparent and draw the quad strip into `viewport`.
    fn encode(
        &self,
        encoder: &mut CommandEncoder,
        target: &TextureView,
        viewport: Viewport,
    ) -> Result<()> {
        let Some(frame_texture) = self.frame.as_ref() else {
            return Err(PlayerError::draw("no frame uploaded"));
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("alphaplay-composite"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_viewport(viewport.x, viewport.y, viewport.width, viewport.height, 0.0, 1.0);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &frame_texture.bind_group, &[]);
        pass.set_vertex_buffer(0, self.position_buffer.slice(..));
        pass.set_vertex_buffer(1, self.tex_coord_buffer.slice(..));
        pass.draw(0..4, 0..1);
        Ok(())
    }
}

/// [`RenderBackend`] on a wgpu device presenting to a window surface.
pub struct WgpuBackend {
    gpu: Option<GpuContext>,
    program: Option<Program>,
    uniforms: QuadUniforms,
    staging: Vec<u8>,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext) -> Self {
        Self {
            gpu: Some(gpu),
            program: None,
            uniforms: QuadUniforms::new([1.0, 1.0, 0.0, 1.0], [0.0, 0.0]),
            staging: Vec::new(),
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn compile(&mut self, program: &ProgramDesc<'_>) -> Result<()> {
        let gpu = self
            .gpu
            .as_ref()
            .ok_or_else(|| PlayerError::context("backend already released"))?;

        let premultiply = output_premultiplied(gpu.surface_config.alpha_mode);
        let desc = ProgramDesc {
            uniforms: program.uniforms.with_premultiply(premultiply),
            ..*program
        };
        self.program = Some(Program::new(&gpu.device, &gpu.queue, gpu.format, &desc)?);
        self.uniforms = desc.uniforms;
        Ok(())
    }

    fn set_vertex_scale(&mut self, scale: [f32; 4]) {
        self.uniforms = self.uniforms.with_scale(scale);
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(width, height);
        }
    }

    fn draw(&mut self, frame: &FrameView<'_>, viewport: Viewport) -> Result<()> {
        let Some(gpu) = self.gpu.as_ref() else {
            return Err(PlayerError::draw("backend already released"));
        };
        let Some(program) = self.program.as_mut() else {
            return Err(PlayerError::draw("program not compiled"));
        };

        let Some(fitted) = fit_viewport(
            viewport,
            [self.uniforms.scale[0], self.uniforms.scale[1]],
            gpu.surface_config.width,
            gpu.surface_config.height,
        ) else {
            return Ok(());
        };

        let surface_texture = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                gpu.reconfigure();
                return Err(PlayerError::draw("surface lost, reconfigured"));
            }
            Err(e) => return Err(PlayerError::draw(e.to_string())),
        };

        program.upload_frame(&gpu.device, &gpu.queue, frame, &mut self.staging);
        let uniforms = self.uniforms.with_transform(fitted.scale, fitted.translate);
        program.uniform_buffer.update(&gpu.queue, &uniforms);

        let view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(gpu.format),
            ..Default::default()
        });
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("alphaplay-frame"),
            });
        program.encode(&mut encoder, &view, fitted.viewport)?;
        gpu.queue.submit(Some(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn release(&mut self) {
        self.program = None;
        self.staging = Vec::new();
        if let Some(gpu) = self.gpu.take() {
            log::info!("Releasing GPU context ({})", gpu.adapter.get_info().name);
        }
    }
}

/// Copy `frame` bottom row first, expanding RGB to opaque RGBA.
fn pack_rgba_flipped(frame: &FrameView<'_>, out: &mut Vec<u8>) {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let row_bytes = frame.row_bytes();
    out.clear();
    out.reserve(width * height * 4);
    for y in (0..height).rev() {
        let row = &frame.data[y * row_bytes..(y + 1) * row_bytes];
        match frame.format {
            PixelFormat::Rgba8 => out.extend_from_slice(row),
            PixelFormat::Rgb8 => {
                for px in row.chunks_exact(3) {
                    out.extend_from_slice(&[px[0], px[1], px[2], 255]);
                }
            }
        }
    }
}

fn create_frame_texture(device: &Device, program: &Program, width: u32, height: u32) -> FrameTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("alphaplay-frame"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FRAME_TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = program.uniform_buffer.create_bind_group(
        device,
        &program.bind_group_layout,
        &view,
        &program.sampler,
    );
    log::debug!("Frame texture {width}x{height}");
    FrameTexture {
        texture,
        bind_group,
        width,
        height,
    }
}

fn create_bind_group_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("alphaplay-bind-group-layout"),
        entries: &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<QuadUniforms>() as u64,
                    ),
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn create_pipeline(
    device: &Device,
    format: TextureFormat,
    bind_group_layout: &BindGroupLayout,
    shader_module: &ShaderModule,
) -> RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("alphaplay-pipeline-layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("alphaplay-render-pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: shader_module,
            entry_point: Some("vs_main"),
            buffers: &[
                VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &POSITION_ATTRS,
                },
                VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &TEX_COORD_ATTRS,
                },
            ],
            compilation_options: PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader_module,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: PipelineCompilationOptions::default(),
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleStrip,
            ..PrimitiveState::default()
        },
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::fullscreen_quad::ALPHA_QUAD_SHADER;
    use crate::gpu::geometry::{GeometryPreset, QUAD_POSITIONS};
    use crate::settings::{Orientation, StencilOrder};

    fn headless_device() -> Option<(Device, Queue)> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .ok()?;
        let required_limits =
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            required_limits,
            ..Default::default()
        }))
        .ok()
    }

    /// Composite a 1x2 portrait frame (color row over mask row) into one pixel.
    fn composite_pixel(
        device: &Device,
        queue: &Queue,
        color: [u8; 3],
        mask: u8,
        premultiply: bool,
    ) -> [u8; 4] {
        let preset = GeometryPreset::lookup(Orientation::Portrait, StencilOrder::Back);
        let desc = ProgramDesc {
            source: ALPHA_QUAD_SHADER,
            positions: &QUAD_POSITIONS,
            tex_coords: &preset.tex_coords,
            uniforms: QuadUniforms::new([1.0, 1.0, 0.0, 1.0], preset.stencil_offset)
                .with_premultiply(premultiply),
        };
        let mut program = Program::new(device, queue, TextureFormat::Rgba8Unorm, &desc).unwrap();
        let data = [color[0], color[1], color[2], mask, mask, mask];
        let frame = FrameView {
            data: &data,
            width: 1,
            height: 2,
            format: PixelFormat::Rgb8,
        };
        program.upload_frame(device, queue, &frame, &mut Vec::new());

        let extent = wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        };
        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test-target"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("test-readback"),
            size: 256,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        let viewport = Viewport {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        };
        program.encode(&mut encoder, &view, viewport).unwrap();
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(256),
                    rows_per_image: Some(1),
                },
            },
            extent,
        );
        queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        device.poll(wgpu::PollType::wait_indefinitely()).unwrap();
        let mapped = slice.get_mapped_range();
        [mapped[0], mapped[1], mapped[2], mapped[3]]
    }

    fn assert_close(actual: [u8; 4], expected: [u8; 4]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!(a.abs_diff(e) <= 1, "got {actual:?}, expected {expected:?}");
        }
    }

    #[test]
    fn frame_texture_is_linear() {
        assert!(!FRAME_TEXTURE_FORMAT.is_srgb());
    }

    #[test]
    fn mask_byte_becomes_alpha_unchanged() {
        let Some((device, queue)) = headless_device() else {
            eprintln!("no GPU adapter, skipping compositing check");
            return;
        };
        assert_close(composite_pixel(&device, &queue, [255, 255, 255], 128, true), [128, 128, 128, 128]);
        assert_close(composite_pixel(&device, &queue, [255, 255, 255], 128, false), [255, 255, 255, 128]);
        assert_close(composite_pixel(&device, &queue, [200, 100, 0], 255, true), [200, 100, 0, 255]);
        assert_close(composite_pixel(&device, &queue, [200, 100, 0], 0, true), [0, 0, 0, 0]);
    }

    #[test]
    fn rgb_rows_are_flipped_and_expanded() {
        // 1x2 frame: top pixel red, bottom pixel blue.
        let data = [255, 0, 0, 0, 0, 255];
        let frame = FrameView {
            data: &data,
            width: 1,
            height: 2,
            format: PixelFormat::Rgb8,
        };
        let mut out = Vec::new();
        pack_rgba_flipped(&frame, &mut out);
        assert_eq!(out, vec![0, 0, 255, 255, 255, 0, 0, 255]);
    }

    #[test]
    fn rgba_rows_are_flipped_verbatim() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        let frame = FrameView {
            data: &data,
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8,
        };
        let mut out = vec![0xAA; 3];
        pack_rgba_flipped(&frame, &mut out);
        assert_eq!(out, vec![9, 10, 11, 12, 13, 14, 15, 16, 1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
