//! Packed-frame video source backed by an ffmpeg subprocess.
//!
//! - `ffprobe` probes metadata (dimensions, fps, duration)
//! - `ffmpeg -f rawvideo -pix_fmt rgb24` decodes ALL frames to memory on a worker thread
//! - the worker hands the clip back over a channel; `canplay` fires when it lands
//! - playback position follows the wall clock scaled by the playback rate
//! - RAM cost: ~5.5MB per packed 720x2560 frame, ~5GB for 30s at 30fps.

use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crossbeam_channel::{Receiver, TryRecvError};

use super::VideoSource;
use super::types::{Advance, DecodedFrame, FrameView, PixelFormat, PlaybackEvent, Transport};
use crate::settings::PlayerConfig;

/// Maximum video duration (seconds) we'll pre-decode. Beyond this, reject.
pub const MAX_PREDECODE_SECS: f64 = 60.0;

/// Check if ffmpeg/ffprobe are available on the system. Cached per process.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("ffprobe")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

/// Video metadata from ffprobe.
#[derive(Debug, Clone)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
}

/// Probe video metadata using ffprobe.
pub fn probe_video(path: &Path) -> Result<VideoMeta, String> {
    let output = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| format!("ffprobe failed to execute: {e}"))?;

    if !output.status.success() {
        return Err(format!("ffprobe could not read {}", path.display()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| format!("Failed to parse ffprobe JSON: {e}"))?;
    parse_probe(&json)
}

fn parse_probe(json: &serde_json::Value) -> Result<VideoMeta, String> {
    let streams = json["streams"]
        .as_array()
        .ok_or("No streams in ffprobe output")?;

    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or("No video stream found")?;

    let width = video_stream["width"].as_u64().ok_or("Missing width")? as u32;
    let height = video_stream["height"].as_u64().ok_or("Missing height")? as u32;

    let fps = parse_frame_rate(video_stream["r_frame_rate"].as_str().unwrap_or("30/1"));

    let duration_secs = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            video_stream["duration"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    Ok(VideoMeta {
        width,
        height,
        fps,
        duration_secs,
    })
}

fn parse_frame_rate(rate: &str) -> f64 {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().unwrap_or(30.0);
        let d: f64 = den.parse().unwrap_or(1.0);
        if d > 0.0 && n > 0.0 { n / d } else { 30.0 }
    } else {
        rate.parse().ok().filter(|r: &f64| *r > 0.0).unwrap_or(30.0)
    }
}

/// Decode every frame as packed RGB in a single ffmpeg run. Setting `cancel`
/// stops reading and kills the ffmpeg child.
pub fn decode_all_frames(
    path: &Path,
    meta: &VideoMeta,
    cancel: &AtomicBool,
) -> Result<Vec<DecodedFrame>, String> {
    let frame_size = (meta.width as usize) * (meta.height as usize) * 3;

    let est_frames = (meta.duration_secs * meta.fps).ceil() as usize;
    log::info!(
        "Pre-decoding video: ~{} frames, ~{}MB RAM",
        est_frames,
        (est_frames * frame_size) / (1024 * 1024),
    );

    let mut child = Command::new("ffmpeg")
        .args(["-i"])
        .arg(path)
        .args([
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "-s", &format!("{}x{}", meta.width, meta.height),
            "-v", "quiet",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("Failed to spawn ffmpeg: {e}"))?;

    let Some(stdout) = child.stdout.take() else {
        let _ = child.kill();
        let _ = child.wait();
        return Err("ffmpeg: no stdout pipe".to_string());
    };

    let frames = read_frames(stdout, meta, est_frames, cancel);
    if frames.is_err() {
        let _ = child.kill();
    }
    let _ = child.wait();
    let frames = frames?;

    log::info!(
        "Decoded {} video frames ({}MB)",
        frames.len(),
        (frames.len() * frame_size) / (1024 * 1024),
    );

    Ok(frames)
}

/// Read whole rgb24 frames from `reader` until EOF or until `cancel` is set.
fn read_frames(
    mut reader: impl Read,
    meta: &VideoMeta,
    capacity: usize,
    cancel: &AtomicBool,
) -> Result<Vec<DecodedFrame>, String> {
    let frame_size = (meta.width as usize) * (meta.height as usize) * 3;
    let mut frames = Vec::with_capacity(capacity);
    let mut buf = vec![0u8; frame_size];
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err("decode cancelled".to_string());
        }
        if reader.read_exact(&mut buf).is_err() {
            break;
        }
        frames.push(DecodedFrame {
            data: buf.clone(),
            width: meta.width,
            height: meta.height,
            format: PixelFormat::Rgb8,
        });
    }
    if frames.is_empty() {
        return Err("ffmpeg decoded zero frames".to_string());
    }
    Ok(frames)
}

struct DecodedClip {
    meta: VideoMeta,
    frames: Vec<DecodedFrame>,
}

fn load_clip(path: &Path, cancel: &AtomicBool) -> Result<DecodedClip, String> {
    if !ffmpeg_available() {
        return Err("ffmpeg/ffprobe not found in PATH".to_string());
    }
    let meta = probe_video(path)?;
    if meta.duration_secs > MAX_PREDECODE_SECS {
        return Err(format!(
            "{:.1}s clip exceeds the {MAX_PREDECODE_SECS}s pre-decode limit",
            meta.duration_secs
        ));
    }
    if cancel.load(Ordering::Relaxed) {
        return Err("decode cancelled".to_string());
    }
    let frames = decode_all_frames(path, &meta, cancel)?;
    Ok(DecodedClip { meta, frames })
}

/// A [`VideoSource`] that plays a pre-decoded file.
pub struct FfmpegVideo {
    path: PathBuf,
    autoplay: bool,
    pending_play: bool,
    transport: Transport,
    clip: Option<DecodedClip>,
    loader: Option<Receiver<Result<DecodedClip, String>>>,
    /// Shared with the decode worker; set on close.
    cancel: Arc<AtomicBool>,
    events: VecDeque<PlaybackEvent>,
    last_tick: Instant,
    closed: bool,
}

impl FfmpegVideo {
    /// Start decoding `config.source` in the background.
    pub fn open(config: &PlayerConfig) -> Self {
        let path = PathBuf::from(&config.source);
        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker_path = path.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let mut events = VecDeque::new();

        let spawned = std::thread::Builder::new()
            .name("alphaplay-decode".into())
            .spawn(move || {
                let result = load_clip(&worker_path, &worker_cancel);
                if let Err(e) = &result {
                    log::debug!("Decode worker for {} stopped: {e}", worker_path.display());
                }
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            events.push_back(PlaybackEvent::Error(format!("decode worker: {e}")));
        }

        Self {
            path,
            autoplay: config.autoplay,
            pending_play: false,
            transport: Transport::new(0.0, config.looping, config.speed.get()),
            clip: None,
            loader: Some(rx),
            cancel,
            events,
            last_tick: Instant::now(),
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn receive_clip(&mut self) {
        let Some(loader) = &self.loader else {
            return;
        };
        let result = match loader.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err("decode worker exited".to_string()),
        };
        self.loader = None;

        match result {
            Ok(clip) => {
                let duration = clip.frames.len() as f64 / clip.meta.fps;
                self.transport = Transport::new(duration, self.transport.looping, self.transport.rate);
                if self.transport.rate < 0.0 {
                    self.transport.rewind();
                }
                log::info!(
                    "Video ready: {} ({}x{}, {:.2}s)",
                    self.path.display(),
                    clip.meta.width,
                    clip.meta.height,
                    duration
                );
                self.clip = Some(clip);
                self.events.push_back(PlaybackEvent::CanPlay);
                if self.autoplay || self.pending_play {
                    self.pending_play = false;
                    self.play();
                }
            }
            Err(e) => {
                log::error!("Failed to load {}: {e}", self.path.display());
                self.events.push_back(PlaybackEvent::Error(e));
            }
        }
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f64();
        self.last_tick = now;
        if self.transport.advance(dt) == Advance::Finished {
            self.events.push_back(PlaybackEvent::Ended);
        }
    }
}

impl VideoSource for FfmpegVideo {
    fn play(&mut self) {
        if self.closed {
            return;
        }
        if self.clip.is_none() {
            self.pending_play = true;
            return;
        }
        if self.transport.playing {
            return;
        }
        if self.transport.at_boundary() {
            self.transport.rewind();
        }
        self.transport.playing = true;
        self.last_tick = Instant::now();
        self.events.push_back(PlaybackEvent::Play);
    }

    fn pause(&mut self) {
        self.pending_play = false;
        if !self.transport.playing {
            return;
        }
        self.tick();
        self.transport.playing = false;
        self.events.push_back(PlaybackEvent::Pause);
    }

    fn set_playback_rate(&mut self, rate: f32) {
        if self.transport.playing {
            self.tick();
        }
        self.transport.rate = rate;
    }

    fn playback_rate(&self) -> f32 {
        self.transport.rate
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.clip.as_ref().map(|c| (c.meta.width, c.meta.height))
    }

    fn current_frame(&self) -> Option<FrameView<'_>> {
        let clip = self.clip.as_ref()?;
        let idx = self.transport.frame_index(clip.meta.fps, clip.frames.len());
        clip.frames.get(idx).map(DecodedFrame::view)
    }

    fn poll_events(&mut self) -> Vec<PlaybackEvent> {
        if self.closed {
            return Vec::new();
        }
        self.receive_clip();
        if self.transport.playing {
            self.tick();
        }
        self.events.drain(..).collect()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cancel.store(true, Ordering::Relaxed);
        self.transport.playing = false;
        self.loader = None;
        self.clip = None;
        self.events.clear();
        log::debug!("Closed video {}", self.path.display());
    }
}
