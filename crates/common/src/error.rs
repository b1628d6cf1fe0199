//! Error types shared across Raytrack crates.

/// Top-level error type for Raytrack operations.
#[derive(Debug, thiserror::Error)]
pub enum RaytrackError {
    /// Invalid or unsupported configuration, e.g. an unknown encoder format.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A resource needed for capture (blend buffer, runtime) could not be set up.
    #[error("Resource initialization error: {message}")]
    ResourceInit { message: String },

    /// A frame could not be turned into encoder output.
    #[error("Frame encode error: {message}")]
    FrameEncode { message: String },

    /// The host already has its time sources overridden by another session.
    #[error("Time source override already active")]
    OverrideActive,

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using RaytrackError.
pub type RaytrackResult<T> = Result<T, RaytrackError>;

impl RaytrackError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn resource_init(msg: impl Into<String>) -> Self {
        Self::ResourceInit {
            message: msg.into(),
        }
    }

    pub fn frame_encode(msg: impl Into<String>) -> Self {
        Self::FrameEncode {
            message: msg.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
        }
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
