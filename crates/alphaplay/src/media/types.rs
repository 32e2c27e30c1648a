/// Channel layout of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// A decoded frame owned by a video source.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl DecodedFrame {
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            data: &self.data,
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

/// Borrowed view of the frame a source is currently showing. Rows run top to bottom.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FrameView<'_> {
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() >= self.row_bytes() * self.height as usize
    }
}

/// Lifecycle notifications fired by a video source.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    CanPlay,
    Play,
    Pause,
    Ended,
    Error(String),
}

/// Outcome of advancing a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Continue,
    Wrapped,
    Finished,
}

/// Playback position bookkeeping for a clip of known duration.
#[derive(Debug, Clone)]
pub struct Transport {
    pub playing: bool,
    pub looping: bool,
    /// Negative rates play backwards.
    pub rate: f32,
    /// Current position in seconds.
    pub position: f64,
    /// Total duration in seconds.
    pub duration: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            playing: false,
            looping: false,
            rate: 1.0,
            position: 0.0,
            duration: 0.0,
        }
    }
}

impl Transport {
    pub fn new(duration: f64, looping: bool, rate: f32) -> Self {
        Self {
            looping,
            rate,
            duration: duration.max(0.0),
            ..Self::default()
        }
    }

    /// Advance by `dt_secs` of wall-clock time scaled by the rate.
    pub fn advance(&mut self, dt_secs: f64) -> Advance {
        if !self.playing || self.duration <= 0.0 {
            return Advance::Continue;
        }

        self.position += dt_secs * f64::from(self.rate);

        let past_end = self.position >= self.duration;
        let before_start = self.position < 0.0;
        if !past_end && !before_start {
            return Advance::Continue;
        }

        if self.looping {
            self.position = self.position.rem_euclid(self.duration);
            Advance::Wrapped
        } else {
            self.position = if past_end { self.duration } else { 0.0 };
            self.playing = false;
            Advance::Finished
        }
    }

    /// Whether the position sits at the end playback is heading toward.
    pub fn at_boundary(&self) -> bool {
        if self.rate < 0.0 {
            self.position <= 0.0
        } else {
            self.position >= self.duration
        }
    }

    /// Rewind to the start for the current direction, as a media element does
    /// when played after ending.
    pub fn rewind(&mut self) {
        self.position = if self.rate < 0.0 { self.duration } else { 0.0 };
    }

    /// Frame index for the current position, clamped to the clip.
    pub fn frame_index(&self, fps: f64, frame_count: usize) -> usize {
        if frame_count == 0 {
            return 0;
        }
        let idx = (self.position * fps).floor();
        if idx <= 0.0 {
            0
        } else {
            (idx as usize).min(frame_count - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_defaults() {
        let t = Transport::default();
        assert!(!t.playing);
        assert!(!t.looping);
        assert!((t.rate - 1.0).abs() < 1e-6);
        assert!((t.position - 0.0).abs() < 1e-10);
    }

    #[test]
    fn paused_transport_does_not_move() {
        let mut t = Transport::new(2.0, false, 1.0);
        assert_eq!(t.advance(1.0), Advance::Continue);
        assert!((t.position - 0.0).abs() < 1e-10);
    }

    #[test]
    fn rate_scales_elapsed_time() {
        let mut t = Transport::new(10.0, false, 2.0);
        t.playing = true;
        assert_eq!(t.advance(1.5), Advance::Continue);
        assert!((t.position - 3.0).abs() < 1e-9);
    }

    #[test]
    fn finishes_at_end_without_loop() {
        let mut t = Transport::new(2.0, false, 1.0);
        t.playing = true;
        assert_eq!(t.advance(2.5), Advance::Finished);
        assert!(!t.playing);
        assert!((t.position - 2.0).abs() < 1e-10);
        assert!(t.at_boundary());
    }

    #[test]
    fn wraps_with_loop() {
        let mut t = Transport::new(2.0, true, 1.0);
        t.playing = true;
        assert_eq!(t.advance(2.5), Advance::Wrapped);
        assert!(t.playing);
        assert!((t.position - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reverse_finishes_at_start() {
        let mut t = Transport::new(2.0, false, -0.5);
        t.playing = true;
        t.position = 0.5;
        assert_eq!(t.advance(2.0), Advance::Finished);
        assert!((t.position - 0.0).abs() < 1e-10);
        assert!(t.at_boundary());
        t.rewind();
        assert!((t.position - 2.0).abs() < 1e-10);
    }

    #[test]
    fn frame_index_clamps() {
        let mut t = Transport::new(1.0, false, 1.0);
        t.position = 0.51;
        assert_eq!(t.frame_index(30.0, 30), 15);
        t.position = 1.0;
        assert_eq!(t.frame_index(30.0, 30), 29);
        assert_eq!(t.frame_index(30.0, 0), 0);
    }

    #[test]
    fn frame_view_completeness() {
        let frame = DecodedFrame {
            data: vec![0; 2 * 2 * 3],
            width: 2,
            height: 2,
            format: PixelFormat::Rgb8,
        };
        let view = frame.view();
        assert_eq!(view.row_bytes(), 6);
        assert!(view.is_complete());
        let short = FrameView {
            data: &frame.data[..5],
            ..view
        };
        assert!(!short.is_complete());
    }
}
