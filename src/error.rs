//! Errors returned to the embedding host.

use crate::engine::EngineError;

/// Errors surfaced to the embedding host as the result of a command.
///
/// Recoverable conditions (missing resources, a failed frame, stale picks or
/// highlights) never reach this type; they are logged where they happen.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported model format: {name}")]
    UnsupportedFormat { name: String },
    #[error("failed to load model {name}: {source}")]
    LoadError {
        name: String,
        #[source]
        source: EngineError,
    },
    #[error("method not implemented: {0}")]
    NotImplemented(String),
    #[error("model view is no longer receiving commands")]
    ViewClosed,
}

impl ViewerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Wire code reported back over the host's method channel.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            Self::LoadError { .. } => "LOAD_ERROR",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
            Self::ViewClosed => "VIEW_CLOSED",
        }
    }
}
