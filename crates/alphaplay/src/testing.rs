//! GPU-free doubles for unit tests.

use std::cell::Cell;
use std::collections::VecDeque;

use crate::error::{PlayerError, Result};
use crate::gpu::pipeline::{GpuProvider, ProgramDesc, RenderBackend};
use crate::gpu::uniforms::QuadUniforms;
use crate::gpu::viewport::{Viewport, ViewportMetrics};
use crate::media::{DecodedFrame, FrameView, PixelFormat, PlaybackEvent, VideoSource};

pub fn rgb_frame(width: u32, height: u32) -> DecodedFrame {
    DecodedFrame {
        data: vec![128; (width * height * 3) as usize],
        width,
        height,
        format: PixelFormat::Rgb8,
    }
}

#[derive(Debug, Clone)]
pub struct RecordedProgram {
    pub source: String,
    pub positions: [[f32; 2]; 4],
    pub tex_coords: [[f32; 2]; 4],
    pub uniforms: QuadUniforms,
}

/// Records every call; fails compile or draws on request.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub program: Option<RecordedProgram>,
    pub compile_error: Option<String>,
    /// Number of upcoming draws that fail.
    pub failing_draws: u32,
    pub draws: Vec<((u32, u32), Viewport)>,
    pub surface_size: Option<(u32, u32)>,
    pub vertex_scale: Option<[f32; 4]>,
    pub releases: u32,
}

impl RenderBackend for RecordingBackend {
    fn compile(&mut self, program: &ProgramDesc<'_>) -> Result<()> {
        if let Some(msg) = &self.compile_error {
            return Err(PlayerError::ShaderCompile(msg.clone()));
        }
        self.program = Some(RecordedProgram {
            source: program.source.to_string(),
            positions: *program.positions,
            tex_coords: *program.tex_coords,
            uniforms: program.uniforms,
        });
        Ok(())
    }

    fn set_vertex_scale(&mut self, scale: [f32; 4]) {
        self.vertex_scale = Some(scale);
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.surface_size = Some((width, height));
    }

    fn draw(&mut self, frame: &FrameView<'_>, viewport: Viewport) -> Result<()> {
        if self.failing_draws > 0 {
            self.failing_draws -= 1;
            return Err(PlayerError::draw("surface lost"));
        }
        self.draws.push(((frame.width, frame.height), viewport));
        Ok(())
    }

    fn release(&mut self) {
        self.releases += 1;
    }
}

/// Container double with a switchable GPU.
pub struct FakeProvider {
    pub capable: bool,
    pub context_error: Option<String>,
    pub compile_error: Option<String>,
    pub failing_draws: u32,
    pub metrics: ViewportMetrics,
    pub backends_created: Cell<u32>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            capable: true,
            context_error: None,
            compile_error: None,
            failing_draws: 0,
            metrics: ViewportMetrics::new(360, 640, 1.0),
            backends_created: Cell::new(0),
        }
    }
}

impl GpuProvider for FakeProvider {
    type Backend = RecordingBackend;

    fn check_capability(&self) -> bool {
        self.capable
    }

    fn metrics(&self) -> ViewportMetrics {
        self.metrics
    }

    fn create_backend(&self, metrics: ViewportMetrics) -> Result<RecordingBackend> {
        if let Some(msg) = &self.context_error {
            return Err(PlayerError::context(msg.clone()));
        }
        self.backends_created.set(self.backends_created.get() + 1);
        Ok(RecordingBackend {
            compile_error: self.compile_error.clone(),
            failing_draws: self.failing_draws,
            surface_size: Some(metrics.surface_size()),
            ..RecordingBackend::default()
        })
    }
}

/// Video double whose events are queued by the test.
#[derive(Debug)]
pub struct ScriptedVideo {
    pub frame: Option<DecodedFrame>,
    pub size: Option<(u32, u32)>,
    pub rate: f32,
    pub events: VecDeque<PlaybackEvent>,
    pub play_calls: u32,
    pub pause_calls: u32,
    pub closed: u32,
}

impl ScriptedVideo {
    /// A packed 720x2560 portrait clip (two 720x1280 halves).
    pub fn packed() -> Self {
        Self {
            frame: Some(rgb_frame(8, 8)),
            size: Some((720, 2560)),
            rate: 1.0,
            events: VecDeque::new(),
            play_calls: 0,
            pause_calls: 0,
            closed: 0,
        }
    }
}

impl VideoSource for ScriptedVideo {
    fn play(&mut self) {
        self.play_calls += 1;
    }

    fn pause(&mut self) {
        self.pause_calls += 1;
    }

    fn set_playback_rate(&mut self, rate: f32) {
        self.rate = rate;
    }

    fn playback_rate(&self) -> f32 {
        self.rate
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn current_frame(&self) -> Option<FrameView<'_>> {
        self.frame.as_ref().map(DecodedFrame::view)
    }

    fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        self.events.drain(..).collect()
    }

    fn close(&mut self) {
        self.closed += 1;
        self.events.clear();
    }
}
