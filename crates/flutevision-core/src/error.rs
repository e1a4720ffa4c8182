//! Error types for FluteVision

use crate::types::Mode;
use std::path::PathBuf;

/// Result type alias using FluteVision's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for FluteVision operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Mode string outside the closed set of known modes
    #[error("invalid mode: {0}")]
    InvalidMode(String),

    /// Request carried no image bytes
    #[error("missing image payload")]
    MissingImage,

    /// Image bytes could not be decoded into pixels
    #[error("could not decode image: {0}")]
    Decode(String),

    /// Service has not been initialized (or has been shut down)
    #[error("service not ready")]
    NotReady,

    /// The mode is known but its artifact failed to load
    #[error("mode '{0}' is not loaded")]
    ModeNotLoaded(Mode),

    /// Persisted classifier artifact could not be loaded
    #[error("failed to load artifact {path:?}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    /// Classifier execution errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Landmark detector errors
    #[error("detector error: {0}")]
    Detector(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error taxonomy used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad client input (unknown mode, missing payload); not retried
    Validation,
    /// Corrupt or unsupported image bytes
    Decode,
    /// Service or requested mode unavailable; retry after startup
    NotReady,
    /// Startup-time failure (artifact or configuration)
    Startup,
    /// Unexpected failure while serving a request
    Internal,
}

impl ErrorKind {
    /// Stable lowercase name, used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Decode => "decode",
            Self::NotReady => "not_ready",
            Self::Startup => "startup",
            Self::Internal => "internal",
        }
    }
}

impl Error {
    /// Create a new artifact load error
    pub fn artifact(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArtifactLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new detector error
    pub fn detector(msg: impl Into<String>) -> Self {
        Self::Detector(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify this error into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMode(_) | Self::MissingImage => ErrorKind::Validation,
            Self::Decode(_) => ErrorKind::Decode,
            Self::NotReady | Self::ModeNotLoaded(_) => ErrorKind::NotReady,
            Self::ArtifactLoad { .. } | Self::Config(_) => ErrorKind::Startup,
            Self::Classifier(_)
            | Self::Detector(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::InvalidMode("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::MissingImage.kind(), ErrorKind::Validation);
        assert_eq!(Error::decode("bad").kind(), ErrorKind::Decode);
        assert_eq!(Error::NotReady.kind(), ErrorKind::NotReady);
        assert_eq!(Error::ModeNotLoaded(Mode::Hand).kind(), ErrorKind::NotReady);
        assert_eq!(Error::artifact("a.json", "missing").kind(), ErrorKind::Startup);
        assert_eq!(Error::classifier("boom").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_messages() {
        assert_eq!(Error::NotReady.to_string(), "service not ready");
        assert_eq!(
            Error::InvalidMode("piano".into()).to_string(),
            "invalid mode: piano"
        );
        assert_eq!(
            Error::ModeNotLoaded(Mode::Hand).to_string(),
            "mode 'hand' is not loaded"
        );
    }
}
