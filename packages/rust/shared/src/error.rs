//! Error types for articlesmith.
//!
//! Library crates use [`ArticlesmithError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all articlesmith operations.
#[derive(Debug, thiserror::Error)]
pub enum ArticlesmithError {
    /// A required configuration key is absent or invalid.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network failure, timeout, or non-success HTTP status on an external call.
    #[error("transport error: {0}")]
    Transport(String),

    /// An external capability answered with a shape we do not recognize.
    #[error("provider error: {0}")]
    Provider(String),

    /// Semi-structured AI output could not be parsed. Recovered locally.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Apply attempted with a missing/expired token, missing job fields,
    /// a blank topic, or an illegal stage transition.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArticlesmithError>;

impl ArticlesmithError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a transport error from any displayable message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a provider error from any displayable message.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable tag for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Transport(_) => "transport",
            Self::Provider(_) => "provider",
            Self::Parse { .. } => "parse",
            Self::Validation { .. } => "validation",
            Self::Storage(_) => "storage",
            Self::Io { .. } => "io",
        }
    }

    /// True for the classes that only ever degrade a job, never fail it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}
