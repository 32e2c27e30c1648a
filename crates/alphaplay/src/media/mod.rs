pub mod types;
pub mod video;

pub use types::{DecodedFrame, FrameView, PixelFormat, PlaybackEvent};
pub use video::FfmpegVideo;

/// The playback element the player drives and reads frames from.
///
/// Lifecycle notifications are queued by the source and drained with
/// [`VideoSource::poll_events`]; dropping or closing the source discards them.
pub trait VideoSource {
    fn play(&mut self);
    fn pause(&mut self);
    fn set_playback_rate(&mut self, rate: f32);
    fn playback_rate(&self) -> f32;

    /// Decoded frame size, once known.
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// The frame that should be on screen now.
    fn current_frame(&self) -> Option<FrameView<'_>>;

    /// Events fired since the last call, oldest first.
    fn poll_events(&mut self) -> Vec<PlaybackEvent>;

    /// Stop playback and release decoded media. Further calls are no-ops.
    fn close(&mut self);
}
