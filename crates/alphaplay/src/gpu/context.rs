use std::sync::Arc;

use wgpu::{
    Adapter, CompositeAlphaMode, Device, DeviceDescriptor, ExperimentalFeatures, Instance,
    InstanceDescriptor, Limits, MemoryHints, PowerPreference, Queue, RequestAdapterOptions,
    Surface, SurfaceConfiguration, TextureFormat, TextureUsages, Trace,
};
use winit::dpi::LogicalSize;
use winit::window::Window;

use super::pipeline::GpuProvider;
use super::viewport::ViewportMetrics;
use super::wgpu_backend::WgpuBackend;
use crate::error::{PlayerError, Result};

/// Probe for a usable adapter with a throwaway instance.
/// Returns false on any failure, including a panicking driver probe.
pub fn check_capability() -> bool {
    std::panic::catch_unwind(|| {
        let instance = Instance::new(&InstanceDescriptor::default());
        pollster::block_on(instance.request_adapter(&RequestAdapterOptions::default())).is_ok()
    })
    .unwrap_or(false)
}

/// An output surface not yet bound to a device.
pub struct SurfaceHandle {
    pub instance: Instance,
    pub surface: Surface<'static>,
    /// Pixel-buffer size: logical size times dpr.
    pub width: u32,
    pub height: u32,
}

pub fn create_surface(window: Arc<Window>, metrics: ViewportMetrics) -> Result<SurfaceHandle> {
    let instance = Instance::new(&InstanceDescriptor::default());
    let surface = instance
        .create_surface(window)
        .map_err(|e| PlayerError::context(format!("surface: {e}")))?;
    let (width, height) = metrics.surface_size();
    Ok(SurfaceHandle {
        instance,
        surface,
        width,
        height,
    })
}

/// Adapter requests tried in order: the preferred device, then a
/// legacy-compatible one with downlevel limits.
const ADAPTER_ATTEMPTS: [(&str, PowerPreference, bool); 2] = [
    ("primary", PowerPreference::HighPerformance, false),
    ("compat", PowerPreference::LowPower, true),
];

/// Mask bytes must reach the shader unconverted and the output must not be
/// re-encoded, so a linear format wins. An sRGB-only surface is rendered
/// through its linear view format.
pub fn pick_surface_format(formats: &[TextureFormat]) -> Option<TextureFormat> {
    formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| formats.first())
        .copied()
}

/// Prefer a compositor that blends with the desktop.
pub fn pick_alpha_mode(modes: &[CompositeAlphaMode]) -> CompositeAlphaMode {
    [CompositeAlphaMode::PreMultiplied, CompositeAlphaMode::PostMultiplied]
        .into_iter()
        .find(|m| modes.contains(m))
        .or_else(|| modes.first().copied())
        .unwrap_or(CompositeAlphaMode::Auto)
}

/// Whether the shader should premultiply its output for `mode`.
/// Only a post-multiplying compositor expects straight color.
pub fn output_premultiplied(mode: CompositeAlphaMode) -> bool {
    mode != CompositeAlphaMode::PostMultiplied
}

pub struct GpuContext {
    pub instance: Instance,
    pub adapter: Adapter,
    pub device: Device,
    pub queue: Queue,
    pub surface: Surface<'static>,
    pub surface_config: SurfaceConfiguration,
    /// Format the pipeline renders in; the surface's linear view format.
    pub format: TextureFormat,
}

pub fn acquire_context(handle: SurfaceHandle) -> Result<GpuContext> {
    let SurfaceHandle {
        instance,
        surface,
        width,
        height,
    } = handle;
    let mut last_error = String::from("no adapter attempts made");

    for (name, power_preference, fallback) in ADAPTER_ATTEMPTS {
        let adapter = match pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference,
            compatible_surface: Some(&surface),
            force_fallback_adapter: fallback,
        })) {
            Ok(adapter) => adapter,
            Err(e) => {
                log::warn!("{name} adapter unavailable: {e}");
                last_error = format!("{name} adapter: {e}");
                continue;
            }
        };

        let required_limits = if fallback {
            Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
        } else {
            Limits::default()
        };

        let (device, queue) = match pollster::block_on(adapter.request_device(&DeviceDescriptor {
            label: Some("alphaplay-device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            experimental_features: ExperimentalFeatures::default(),
            memory_hints: MemoryHints::Performance,
            trace: Trace::Off,
        })) {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("{name} device request failed: {e}");
                last_error = format!("{name} device: {e}");
                continue;
            }
        };

        let capabilities = surface.get_capabilities(&adapter);
        let Some(surface_format) = pick_surface_format(&capabilities.formats) else {
            last_error = format!("{name} adapter cannot present to this surface");
            continue;
        };
        let format = surface_format.remove_srgb_suffix();
        let alpha_mode = pick_alpha_mode(&capabilities.alpha_modes);

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: if format == surface_format {
                vec![]
            } else {
                vec![format]
            },
        };
        surface.configure(&device, &surface_config);

        log::info!(
            "GPU initialized ({name}): {} ({:?}), {:?}, alpha {:?}",
            adapter.get_info().name,
            adapter.get_info().backend,
            format,
            alpha_mode
        );

        return Ok(GpuContext {
            instance,
            adapter,
            device,
            queue,
            surface,
            surface_config,
            format,
        });
    }

    Err(PlayerError::ContextUnavailable(last_error))
}

impl GpuContext {
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
        }
    }

    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.surface_config);
    }
}

/// A winit window as the player's container.
pub struct WindowGpu {
    window: Arc<Window>,
}

impl WindowGpu {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl GpuProvider for WindowGpu {
    type Backend = WgpuBackend;

    fn check_capability(&self) -> bool {
        check_capability()
    }

    fn metrics(&self) -> ViewportMetrics {
        let scale = self.window.scale_factor();
        let logical: LogicalSize<u32> = self.window.inner_size().to_logical(scale);
        ViewportMetrics::new(logical.width, logical.height, scale)
    }

    fn create_backend(&self, metrics: ViewportMetrics) -> Result<WgpuBackend> {
        let surface = create_surface(self.window.clone(), metrics)?;
        let context = acquire_context(surface)?;
        Ok(WgpuBackend::new(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_surface_format_is_preferred() {
        let formats = [TextureFormat::Bgra8UnormSrgb, TextureFormat::Bgra8Unorm];
        assert_eq!(pick_surface_format(&formats), Some(TextureFormat::Bgra8Unorm));
    }

    #[test]
    fn srgb_only_surface_renders_through_linear_view() {
        let formats = [TextureFormat::Rgba8UnormSrgb];
        let picked = pick_surface_format(&formats).unwrap();
        assert_eq!(picked.remove_srgb_suffix(), TextureFormat::Rgba8Unorm);
        assert_eq!(pick_surface_format(&[]), None);
    }

    #[test]
    fn alpha_mode_preference() {
        use CompositeAlphaMode as M;
        assert_eq!(
            pick_alpha_mode(&[M::Opaque, M::PostMultiplied, M::PreMultiplied]),
            M::PreMultiplied
        );
        assert_eq!(pick_alpha_mode(&[M::Opaque, M::PostMultiplied]), M::PostMultiplied);
        assert_eq!(pick_alpha_mode(&[M::Opaque]), M::Opaque);
        assert_eq!(pick_alpha_mode(&[]), M::Auto);
    }

    #[test]
    fn straight_color_only_for_post_multiplied() {
        assert!(output_premultiplied(CompositeAlphaMode::PreMultiplied));
        assert!(output_premultiplied(CompositeAlphaMode::Opaque));
        assert!(!output_premultiplied(CompositeAlphaMode::PostMultiplied));
    }
}
