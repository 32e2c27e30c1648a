use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use alphaplay::gpu::{WgpuBackend, WindowGpu};
use alphaplay::media::video::ffmpeg_available;
use alphaplay::{
    AlphaPlayer, FfmpegVideo, Orientation, PlaybackState, PlayerConfig, PlayerError, PlayerHooks,
    Speed, StencilOrder, WindowScheduler,
};

type DesktopPlayer = AlphaPlayer<WgpuBackend, FfmpegVideo, WindowScheduler>;

const USAGE: &str = "usage: alphaplay [--config FILE] [--landscape] [--front] [--loop] \
                     [--autoplay] [--speed N] SOURCE";
const SPEED_STEP: f32 = 0.25;
const IDLE_POLL: Duration = Duration::from_millis(16);

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    landscape: bool,
    front: bool,
    looping: bool,
    autoplay: bool,
    speed: Option<String>,
    source: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.config = Some(args.next().context("--config needs a path")?.into()),
            "--speed" => parsed.speed = Some(args.next().context("--speed needs a value")?),
            "--landscape" => parsed.landscape = true,
            "--front" => parsed.front = true,
            "--loop" => parsed.looping = true,
            "--autoplay" => parsed.autoplay = true,
            "-h" | "--help" => bail!("{USAGE}"),
            flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
            _ if parsed.source.is_some() => bail!("more than one source given\n{USAGE}"),
            _ => parsed.source = Some(arg),
        }
    }
    Ok(parsed)
}

impl Args {
    fn into_config(self) -> Result<PlayerConfig> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::load(path)?,
            None => PlayerConfig::load_default(),
        };
        if let Some(source) = self.source {
            config.source = source;
        }
        if self.landscape {
            config.orientation = Orientation::Landscape;
        }
        if self.front {
            config.stencil_order = StencilOrder::Front;
        }
        config.looping |= self.looping;
        config.autoplay |= self.autoplay;
        if let Some(speed) = self.speed {
            config.speed = Speed::try_from(speed.as_str())?;
        }
        config.validate().context(USAGE)?;
        Ok(config)
    }
}

/// Wake periodically only while the decoder may still report readiness;
/// afterwards input and scheduled redraws drive the loop.
fn control_flow_for(state: PlaybackState, now: Instant) -> ControlFlow {
    match state {
        PlaybackState::None => ControlFlow::WaitUntil(now + IDLE_POLL),
        _ => ControlFlow::Wait,
    }
}

struct PlayerApp {
    config: PlayerConfig,
    player: Option<DesktopPlayer>,
    window: Option<Arc<Window>>,
    sized: bool,
    failure: Option<PlayerError>,
}

impl PlayerApp {
    fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            player: None,
            window: None,
            sized: false,
            failure: None,
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(player) = self.player.as_mut() {
            player.destroy();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for PlayerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title(format!("alphaplay - {}", self.config.source))
            .with_transparent(true)
            .with_inner_size(LogicalSize::new(360, 640));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                self.failure = Some(PlayerError::context(e.to_string()));
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        let hooks = PlayerHooks::default()
            .on_ended(|| log::info!("Playback ended"))
            .on_error(|e| log::error!("Playback stopped: {e}"));
        let provider = WindowGpu::new(window.clone());
        let video = FfmpegVideo::open(&self.config);
        let scheduler = WindowScheduler::new(window);

        match AlphaPlayer::new(&self.config, hooks, &provider, video, scheduler) {
            Ok(player) => {
                self.player = Some(player);
                log::info!("alphaplay initialized");
            }
            Err(e) => {
                log::error!("Failed to initialize player: {e}");
                self.failure = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(player) = self.player.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match key {
                KeyCode::Escape => self.shutdown(event_loop),
                KeyCode::Space => {
                    if player.state() == PlaybackState::Playing {
                        player.pause();
                    } else {
                        player.play();
                    }
                }
                KeyCode::ArrowUp | KeyCode::ArrowDown => {
                    let step = if key == KeyCode::ArrowUp { SPEED_STEP } else { -SPEED_STEP };
                    let next = player.speed().get() + step;
                    if player.set_speed(next).is_ok() {
                        log::info!("Speed {next}");
                    }
                }
                _ => {}
            },
            WindowEvent::Resized(size) => player.resize(size.width, size.height),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => player.set_dpr(scale_factor),
            WindowEvent::RedrawRequested => {
                player.poll();
                player.run_frame();

                // The surface tracks the color half once known; match the window to it.
                if !self.sized {
                    if let (Some((w, h)), Some(window)) = (player.render_size(), &self.window) {
                        let _ = window.request_inner_size(PhysicalSize::new(w, h));
                        self.sized = true;
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        // Lifecycle events arrive while no frame is scheduled (canplay, autoplay).
        let Some(player) = self.player.as_mut() else {
            return;
        };
        player.poll();
        event_loop.set_control_flow(control_flow_for(player.state(), Instant::now()));
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let config = parse_args(std::env::args().skip(1))?.into_config()?;
    if !ffmpeg_available() {
        log::warn!("ffmpeg/ffprobe not found on PATH; decoding will fail");
    }

    let event_loop = EventLoop::new()?;
    let mut app = PlayerApp::new(config);
    event_loop.run_app(&mut app)?;

    if let Some(e) = app.failure {
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn flags_and_source() {
        let parsed = args(&["--landscape", "--front", "--loop", "--speed", "1.5", "clip.mp4"]).unwrap();
        assert_eq!(
            parsed,
            Args {
                landscape: true,
                front: true,
                looping: true,
                speed: Some("1.5".into()),
                source: Some("clip.mp4".into()),
                ..Args::default()
            }
        );
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(args(&["--speed"]).is_err());
        assert!(args(&["--bogus", "clip.mp4"]).is_err());
        assert!(args(&["a.mp4", "b.mp4"]).is_err());
    }

    #[test]
    fn idle_wakeups_only_while_loading() {
        let now = Instant::now();
        assert_eq!(
            control_flow_for(PlaybackState::None, now),
            ControlFlow::WaitUntil(now + IDLE_POLL)
        );
        for state in [
            PlaybackState::CanPlay,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Ended,
            PlaybackState::Error,
        ] {
            assert_eq!(control_flow_for(state, now), ControlFlow::Wait);
        }
    }

    #[test]
    fn overrides_apply_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("player.json");
        std::fs::write(&path, r#"{"source": "file.mp4", "speed": 0.5}"#).unwrap();

        let parsed = args(&["--config", path.to_str().unwrap(), "--autoplay"]).unwrap();
        let config = parsed.into_config().unwrap();
        assert_eq!(config.source, "file.mp4");
        assert!(config.autoplay);
        assert_eq!(config.speed.get(), 0.5);

        let parsed = args(&["--config", path.to_str().unwrap(), "--speed", "9"]).unwrap();
        assert!(parsed.into_config().is_err());
    }
}
