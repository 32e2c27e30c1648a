use crate::error::{PlayerError, Result};
use crate::media::FrameView;

use super::fullscreen_quad::ALPHA_QUAD_SHADER;
use super::geometry::{GeometryPreset, QUAD_POSITIONS};
use super::uniforms::QuadUniforms;
use super::viewport::{Viewport, ViewportMetrics};

/// Everything a backend needs to build the compositing program once.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    pub source: &'a str,
    pub positions: &'a [[f32; 2]; 4],
    pub tex_coords: &'a [[f32; 2]; 4],
    pub uniforms: QuadUniforms,
}

/// The raster/shader device the pipeline drives.
pub trait RenderBackend {
    /// Compile and link the program, upload the static vertex buffers and uniforms.
    /// Compiler diagnostics come back as [`PlayerError::ShaderCompile`].
    fn compile(&mut self, program: &ProgramDesc<'_>) -> Result<()>;

    /// Replace the vertex-stage scale (dpr compensation) used from the next draw.
    fn set_vertex_scale(&mut self, scale: [f32; 4]);

    /// Resize the surface pixel buffer.
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Upload `frame` as the source texture and draw the 4-vertex strip into `viewport`.
    fn draw(&mut self, frame: &FrameView<'_>, viewport: Viewport) -> Result<()>;

    /// Free GPU resources. Called at most once.
    fn release(&mut self);
}

/// The mount target: knows its size, whether a GPU is usable, and how to
/// bind a backend to its surface.
pub trait GpuProvider {
    type Backend: RenderBackend;

    /// False on any failure to obtain a shader-capable device.
    fn check_capability(&self) -> bool;

    /// Logical container size and device-pixel-ratio.
    fn metrics(&self) -> ViewportMetrics;

    /// Create the output surface and acquire a context bound to it.
    fn create_backend(&self, metrics: ViewportMetrics) -> Result<Self::Backend>;
}

/// Owns the compiled program and the sizing state it draws with.
pub struct ShaderPipeline<B: RenderBackend> {
    backend: B,
    preset: GeometryPreset,
    metrics: ViewportMetrics,
    viewport: Viewport,
    released: bool,
}

impl<B: RenderBackend> ShaderPipeline<B> {
    pub fn initialize(
        mut backend: B,
        preset: GeometryPreset,
        metrics: ViewportMetrics,
    ) -> Result<Self> {
        let program = ProgramDesc {
            source: ALPHA_QUAD_SHADER,
            positions: &QUAD_POSITIONS,
            tex_coords: &preset.tex_coords,
            uniforms: QuadUniforms::new(metrics.vertex_scale(), preset.stencil_offset),
        };
        backend.compile(&program)?;

        Ok(Self {
            backend,
            preset,
            metrics,
            viewport: metrics.viewport(),
            released: false,
        })
    }

    /// Upload the current frame and draw it. Touches nothing but GPU state.
    pub fn draw_frame(&mut self, frame: &FrameView<'_>) -> Result<()> {
        if self.released {
            return Err(PlayerError::draw("pipeline already destroyed"));
        }
        if !frame.is_complete() {
            return Err(PlayerError::draw(format!(
                "frame buffer holds {} bytes, {}x{} needs {}",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.row_bytes() * frame.height as usize
            )));
        }
        self.backend.draw(frame, self.viewport)
    }

    /// Size the surface to the decoded, halved frame. Applies from the next draw.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("Ignoring resize to {width}x{height}");
            return;
        }
        self.metrics = self.metrics.with_size(width, height);
        self.viewport = self.metrics.viewport();
        if !self.released {
            self.backend.resize_surface(width, height);
        }
        log::debug!(
            "Render surface {}x{} @ dpr {}, viewport {:?}",
            width,
            height,
            self.metrics.dpr,
            self.viewport
        );
    }

    /// Display the surface at a new device-pixel-ratio. Applies from the next draw.
    pub fn set_dpr(&mut self, dpr: f64) {
        if !(dpr.is_finite() && dpr > 0.0) {
            log::warn!("Ignoring device-pixel-ratio {dpr}");
            return;
        }
        self.metrics = ViewportMetrics::new(self.metrics.width, self.metrics.height, dpr);
        self.viewport = self.metrics.viewport();
        if !self.released {
            self.backend.set_vertex_scale(self.metrics.vertex_scale());
        }
        log::debug!("Device-pixel-ratio {dpr}, viewport {:?}", self.viewport);
    }

    /// Release GPU resources. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.backend.release();
    }

    pub fn is_destroyed(&self) -> bool {
        self.released
    }

    pub fn preset(&self) -> &GeometryPreset {
        &self.preset
    }

    pub fn metrics(&self) -> ViewportMetrics {
        self.metrics
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
