//! Transparent video playback from packed color + mask frames.
//!
//! A packed frame carries the color image in one half and a grayscale opacity
//! mask in the other. [`AlphaPlayer`] uploads each frame once and recombines
//! the halves in a fragment shader into premultiplied RGBA.

pub mod error;
pub mod gpu;
pub mod media;
pub mod player;
pub mod render_loop;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{PlayerError, Result};
pub use media::{FfmpegVideo, PlaybackEvent, VideoSource};
pub use player::{AlphaPlayer, PlaybackState, PlayerHooks};
pub use render_loop::{FrameScheduler, ManualScheduler, RenderLoop, WindowScheduler};
pub use settings::{Orientation, PlayerConfig, Speed, StencilOrder};
