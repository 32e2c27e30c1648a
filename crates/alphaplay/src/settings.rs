use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PlayerError, Result};

/// How the color and mask halves are packed in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Top/bottom halves.
    #[default]
    Portrait,
    /// Left/right halves.
    Landscape,
}

/// Whether the mask half comes first or second along the split axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StencilOrder {
    Front,
    #[default]
    Back,
}

/// Playback rate, validated to lie in `[Speed::MIN, Speed::MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Speed(f32);

impl Speed {
    pub const MIN: f32 = -0.5;
    pub const MAX: f32 = 2.0;

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f32> for Speed {
    type Error = PlayerError;

    fn try_from(value: f32) -> Result<Self> {
        if !value.is_finite() {
            return Err(PlayerError::InvalidSpeed(format!("{value} is not a finite number")));
        }
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(PlayerError::InvalidSpeed(format!(
                "{value} is outside [{}, {}]",
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }
}

impl TryFrom<f64> for Speed {
    type Error = PlayerError;

    fn try_from(value: f64) -> Result<Self> {
        Self::try_from(value as f32)
    }
}

impl TryFrom<&str> for Speed {
    type Error = PlayerError;

    fn try_from(value: &str) -> Result<Self> {
        let parsed: f32 = value
            .trim()
            .parse()
            .map_err(|_| PlayerError::InvalidSpeed(format!("{value:?} is not a number")))?;
        Self::try_from(parsed)
    }
}

impl From<Speed> for f64 {
    fn from(speed: Speed) -> Self {
        f64::from(speed.0)
    }
}

/// Player construction options. Every recognized option is listed here with its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Media locator handed to the video source. Required.
    pub source: String,
    pub autoplay: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub speed: Speed,
    pub orientation: Orientation,
    pub stencil_order: StencilOrder,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            autoplay: false,
            looping: false,
            speed: Speed::default(),
            orientation: Orientation::default(),
            stencil_order: StencilOrder::default(),
        }
    }
}

impl PlayerConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.trim().is_empty() {
            return Err(PlayerError::EmptySource);
        }
        Ok(())
    }

    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| PlayerError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&json)
            .map_err(|e| PlayerError::Config(format!("{}: {e}", path.display())))
    }

    /// `<config_dir>/alphaplay/player.json`, or defaults when absent or unreadable.
    pub fn load_default() -> Self {
        let Some(config_dir) = dirs::config_dir() else {
            return Self::default();
        };
        let path = config_dir.join("alphaplay").join("player.json");
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    log::warn!("Ignoring config: {e}");
                }
                Self::default()
            }
        }
    }
}
