pub mod context;
pub mod fullscreen_quad;
pub mod geometry;
pub mod pipeline;
pub mod uniforms;
pub mod viewport;
pub mod wgpu_backend;

pub use context::{GpuContext, WindowGpu, check_capability};
pub use geometry::GeometryPreset;
pub use pipeline::{GpuProvider, RenderBackend, ShaderPipeline};
pub use uniforms::{QuadUniforms, UniformBuffer};
pub use viewport::{Viewport, ViewportMetrics};
pub use wgpu_backend::WgpuBackend;
