//! Error types for the forcing pipeline.

use thiserror::Error;

/// Primary error type for forcing-pipeline operations.
///
/// Each variant corresponds to one of the error kinds the pipeline's error
/// handling design distinguishes: configuration problems fail fast before any
/// I/O, transport/decoding/crosswalk problems are fatal for the chunk (or the
/// whole run, for crosswalk loading), and per-catchment emit problems are
/// fatal for the chunk but do not corrupt previously committed chunks.
#[derive(Debug, Error)]
pub enum ForcingError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error reading {uri}: {message}")]
    Transport { uri: String, message: String },

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("decoding error: {0}")]
    Decoding(String),

    #[error("crosswalk integrity error: {0}")]
    CrosswalkIntegrity(String),

    #[error("append target missing for catchment {catchment}: {message}")]
    AppendMissing { catchment: String, message: String },

    #[error("failed to emit catchment {catchment}: {message}")]
    Partial { catchment: String, message: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ForcingError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            uri: uri.into(),
            message: message.into(),
        }
    }

    pub fn decoding(msg: impl Into<String>) -> Self {
        Self::Decoding(msg.into())
    }

    pub fn crosswalk_integrity(msg: impl Into<String>) -> Self {
        Self::CrosswalkIntegrity(msg.into())
    }
}

impl From<std::io::Error> for ForcingError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(err.to_string())
        } else {
            Self::Transport {
                uri: String::new(),
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for ForcingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(format!("invalid JSON: {err}"))
    }
}

/// Result type alias using [`ForcingError`].
pub type Result<T> = std::result::Result<T, ForcingError>;
