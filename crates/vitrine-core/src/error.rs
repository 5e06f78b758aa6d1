#![forbid(unsafe_code)]

//! Error types.
//!
//! Nothing here is ever surfaced to an end user. Frame callbacks report
//! failures through [`FrameError`] so the scheduler can isolate them, and
//! configuration loading reports through [`ConfigError`] at startup. Every
//! other failure path in the engine degrades to the last good visual state.

use thiserror::Error;

/// Result type returned by frame callbacks.
pub type FrameResult = std::result::Result<(), FrameError>;

/// Failure reported by a single frame callback.
///
/// The scheduler logs it, counts it against the callback's consecutive
/// failure budget, and keeps running the remaining callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FrameError {
    message: String,
}

impl FrameError {
    /// Create a frame error with a human-readable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can occur when loading an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "config")]
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[cfg(feature = "config")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid color {value:?}: expected #RRGGBB")]
    InvalidColor { value: String },

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_error_displays_message() {
        let err = FrameError::new("probe lost");
        assert_eq!(err.to_string(), "probe lost");
        assert_eq!(err.message(), "probe lost");
    }

    #[test]
    fn validation_error_joins_messages() {
        let err = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "validation errors: a; b");
    }
}
