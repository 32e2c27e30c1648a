pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    #[error("no shader-capable GPU is available")]
    CapabilityUnavailable,

    #[error("video source is empty")]
    EmptySource,

    #[error("could not acquire a GPU context: {0}")]
    ContextUnavailable(String),

    #[error("shader compile error: {0}")]
    ShaderCompile(String),

    #[error("invalid playback speed: {0}")]
    InvalidSpeed(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("draw failed: {0}")]
    Draw(String),

    #[error("config error: {0}")]
    Config(String),
}

impl PlayerError {
    pub fn context(msg: impl Into<String>) -> Self {
        Self::ContextUnavailable(msg.into())
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback(msg.into())
    }

    pub fn draw(msg: impl Into<String>) -> Self {
        Self::Draw(msg.into())
    }

    /// Errors that must abort player construction.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CapabilityUnavailable
                | Self::EmptySource
                | Self::ContextUnavailable(_)
                | Self::ShaderCompile(_)
                | Self::Config(_)
        )
    }
}
