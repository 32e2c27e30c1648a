/// Logical output size plus the device-pixel-ratio it is displayed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub width: u32,
    pub height: u32,
    pub dpr: f64,
}

/// Viewport rectangle in surface pixels. The offset may be negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportMetrics {
    pub fn new(width: u32, height: u32, dpr: f64) -> Self {
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        Self { width, height, dpr }
    }

    pub fn with_size(self, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }

    /// Pixel-buffer size of a freshly created surface: logical size times dpr.
    pub fn surface_size(&self) -> (u32, u32) {
        let w = (f64::from(self.width) * self.dpr).round() as u32;
        let h = (f64::from(self.height) * self.dpr).round() as u32;
        (w.max(1), h.max(1))
    }

    /// Viewport of `dpr` times the logical size, centered on the logical size.
    pub fn viewport(&self) -> Viewport {
        let w = f64::from(self.width);
        let h = f64::from(self.height);
        Viewport {
            x: ((w - w * self.dpr) / 2.0).floor() as f32,
            y: ((h - h * self.dpr) / 2.0).floor() as f32,
            width: (w * self.dpr) as f32,
            height: (h * self.dpr) as f32,
        }
    }

    /// Vertex-stage scale undoing the oversized viewport: `(1/dpr, 1/dpr, 0, 1)`.
    pub fn vertex_scale(&self) -> [f32; 4] {
        let s = (1.0 / self.dpr) as f32;
        [s, s, 0.0, 1.0]
    }
}

/// A viewport that fits inside the render target, with the clip-space transform
/// that keeps the quad where the unclipped viewport would have put it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedViewport {
    pub viewport: Viewport,
    pub scale: [f32; 2],
    pub translate: [f32; 2],
}

/// Clamp `viewport` to a `target_width` x `target_height` surface.
///
/// Some backends reject viewports that extend past the attachment, which the
/// centered dpr viewport does whenever dpr > 1. Returns `None` when nothing of
/// the viewport remains on the target.
pub fn fit_viewport(
    viewport: Viewport,
    scale: [f32; 2],
    target_width: u32,
    target_height: u32,
) -> Option<FittedViewport> {
    let (x, width, sx, tx) = fit_axis(viewport.x, viewport.width, scale[0], target_width as f32)?;
    let (y, height, sy, ty) =
        fit_axis(viewport.y, viewport.height, scale[1], target_height as f32)?;
    Some(FittedViewport {
        viewport: Viewport {
            x,
            y,
            width,
            height,
        },
        scale: [sx, sy],
        // Pixel rows grow downward while clip-space y grows upward.
        translate: [tx, -ty],
    })
}

fn fit_axis(start: f32, len: f32, scale: f32, target: f32) -> Option<(f32, f32, f32, f32)> {
    if len <= 0.0 || target <= 0.0 {
        return None;
    }
    let clamped_start = start.max(0.0);
    let clamped_end = (start + len).min(target);
    let clamped_len = clamped_end - clamped_start;
    if clamped_len <= 0.0 {
        return None;
    }
    // Quad extent in pixels along this axis before clamping.
    let center = start + len / 2.0;
    let half = len / 2.0 * scale;
    let new_scale = 2.0 * half / clamped_len;
    let new_translate = 2.0 * (center - clamped_start) / clamped_len - 1.0;
    Some((clamped_start, clamped_len, new_scale, new_translate))
}
