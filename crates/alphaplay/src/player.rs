//! The player facade: wires a video source, the shader pipeline and the
//! render loop together and maps playback events onto them.

use crate::error::{PlayerError, Result};
use crate::gpu::geometry::GeometryPreset;
use crate::gpu::pipeline::{GpuProvider, RenderBackend, ShaderPipeline};
use crate::media::{PlaybackEvent, VideoSource};
use crate::render_loop::{FrameScheduler, RenderLoop};
use crate::settings::{Orientation, PlayerConfig, Speed};

/// Consecutive failed draws tolerated before playback is abandoned.
pub const MAX_CONSECUTIVE_DRAW_FAILURES: u32 = 3;

/// Player-visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    None,
    CanPlay,
    Playing,
    Paused,
    /// Torn down by [`AlphaPlayer::destroy`] before reaching an end.
    Stopped,
    Ended,
    Error,
}

impl PlaybackState {
    /// Ended and Error accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Error)
    }
}

/// Host callbacks. Both default to no-ops.
pub struct PlayerHooks {
    pub on_ended: Box<dyn FnMut()>,
    pub on_error: Box<dyn FnMut(&PlayerError)>,
}

impl Default for PlayerHooks {
    fn default() -> Self {
        Self {
            on_ended: Box::new(|| {}),
            on_error: Box::new(|_| {}),
        }
    }
}

impl PlayerHooks {
    pub fn on_ended(mut self, f: impl FnMut() + 'static) -> Self {
        self.on_ended = Box::new(f);
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&PlayerError) + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }
}

pub struct AlphaPlayer<B: RenderBackend, V: VideoSource, S: FrameScheduler> {
    orientation: Orientation,
    state: PlaybackState,
    speed: Speed,
    hooks: PlayerHooks,
    video: V,
    pipeline: ShaderPipeline<B>,
    render_loop: RenderLoop<S>,
    /// Halved decoded size once the video reported its dimensions.
    render_size: Option<(u32, u32)>,
    draw_failures: u32,
    destroyed: bool,
}

impl<B: RenderBackend, V: VideoSource, S: FrameScheduler> AlphaPlayer<B, V, S> {
    /// Check the GPU, validate `config`, then bind a context to `provider` and
    /// compile the program. Any failure aborts construction.
    pub fn new<P>(
        config: &PlayerConfig,
        hooks: PlayerHooks,
        provider: &P,
        mut video: V,
        scheduler: S,
    ) -> Result<Self>
    where
        P: GpuProvider<Backend = B>,
    {
        if !provider.check_capability() {
            log::error!("No shader-capable GPU available");
            return Err(PlayerError::CapabilityUnavailable);
        }
        config.validate()?;

        let metrics = provider.metrics();
        let backend = provider.create_backend(metrics)?;
        let preset = GeometryPreset::lookup(config.orientation, config.stencil_order);
        let pipeline = ShaderPipeline::initialize(backend, preset, metrics)?;

        video.set_playback_rate(config.speed.get());
        log::info!(
            "Player ready: {} ({:?}, {:?} mask, speed {})",
            config.source,
            config.orientation,
            config.stencil_order,
            config.speed.get()
        );

        Ok(Self {
            orientation: config.orientation,
            state: PlaybackState::None,
            speed: config.speed,
            hooks,
            video,
            pipeline,
            render_loop: RenderLoop::new(scheduler),
            render_size: None,
            draw_failures: 0,
            destroyed: false,
        })
    }

    pub fn play(&mut self) {
        if !self.destroyed {
            self.video.play();
        }
    }

    pub fn pause(&mut self) {
        if !self.destroyed {
            self.video.pause();
        }
    }

    /// Set the playback rate. Rejected values leave the current rate in place.
    pub fn set_speed<T>(&mut self, value: T) -> Result<()>
    where
        T: TryInto<Speed, Error = PlayerError>,
    {
        let speed = value.try_into().inspect_err(|e| log::warn!("{e}"))?;
        self.speed = speed;
        self.video.set_playback_rate(speed.get());
        log::debug!("Playback rate {}", speed.get());
        Ok(())
    }

    /// Drain pending video events through the state machine.
    pub fn poll(&mut self) {
        if self.destroyed {
            return;
        }
        for event in self.video.poll_events() {
            self.handle_event(event);
        }
    }

    pub fn handle_event(&mut self, event: PlaybackEvent) {
        if self.destroyed || self.state.is_terminal() {
            log::debug!("Ignoring {event:?} in state {:?}", self.state);
            return;
        }
        match event {
            PlaybackEvent::CanPlay => self.transition(PlaybackState::CanPlay),
            PlaybackEvent::Play => {
                if self.state == PlaybackState::Playing {
                    self.render_loop.stop();
                }
                if self.render_size.is_none() {
                    self.size_to_video();
                }
                self.render_loop.start();
                self.transition(PlaybackState::Playing);
            }
            PlaybackEvent::Pause => {
                self.render_loop.stop();
                self.transition(PlaybackState::Paused);
            }
            PlaybackEvent::Ended => {
                self.render_loop.stop();
                self.transition(PlaybackState::Ended);
                (self.hooks.on_ended)();
            }
            PlaybackEvent::Error(msg) => self.fail(PlayerError::playback(msg)),
        }
    }

    /// Run every due frame callback. Returns the number of frames drawn.
    pub fn run_frame(&mut self) -> u32 {
        let mut drawn = 0;
        for handle in self.render_loop.take_due() {
            let pipeline = &mut self.pipeline;
            let video = &self.video;
            let result = self.render_loop.tick(handle, || match video.current_frame() {
                Some(frame) => pipeline.draw_frame(&frame),
                None => Ok(()),
            });
            match result {
                Ok(true) => {
                    self.draw_failures = 0;
                    drawn += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    self.draw_failures += 1;
                    if self.draw_failures >= MAX_CONSECUTIVE_DRAW_FAILURES {
                        self.fail(e);
                        break;
                    }
                    log::warn!(
                        "Draw failed ({}/{MAX_CONSECUTIVE_DRAW_FAILURES}): {e}",
                        self.draw_failures
                    );
                }
            }
        }
        drawn
    }

    /// Resize the output surface, e.g. after the host window changed size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.destroyed {
            self.pipeline.resize(width, height);
        }
    }

    /// The host moved to a display with a different device-pixel-ratio.
    pub fn set_dpr(&mut self, dpr: f64) {
        if !self.destroyed {
            self.pipeline.set_dpr(dpr);
        }
    }

    /// Tear down: close the video, cancel the loop, release the GPU.
    /// Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.video.close();
        self.render_loop.stop();
        self.pipeline.destroy();
        if !self.state.is_terminal() {
            self.transition(PlaybackState::Stopped);
        }
        log::info!("Player destroyed");
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Logical size of the color half, once known.
    pub fn render_size(&self) -> Option<(u32, u32)> {
        self.render_size
    }

    pub fn pipeline(&self) -> &ShaderPipeline<B> {
        &self.pipeline
    }

    pub fn render_loop(&self) -> &RenderLoop<S> {
        &self.render_loop
    }

    pub fn video(&self) -> &V {
        &self.video
    }

    pub fn video_mut(&mut self) -> &mut V {
        &mut self.video
    }

    fn size_to_video(&mut self) {
        let Some((width, height)) = self.video.dimensions() else {
            log::warn!("Video dimensions unknown at play; keeping container size");
            return;
        };
        let (w, h) = GeometryPreset::half_size(self.orientation, width, height);
        self.pipeline.resize(w, h);
        self.render_size = Some((w, h));
    }

    fn fail(&mut self, err: PlayerError) {
        log::error!("{err}");
        self.render_loop.stop();
        self.transition(PlaybackState::Error);
        (self.hooks.on_error)(&err);
    }

    fn transition(&mut self, next: PlaybackState) {
        log::debug!("{:?} -> {next:?}", self.state);
        self.state = next;
    }
}
