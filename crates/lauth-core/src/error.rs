//! Error handling for lauth core utilities.
//!
//! Errors here surface at startup only: a configuration that fails to load or
//! validate stops the server before it binds a socket.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors raised while loading configuration or compiling its values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A glob pattern failed to compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },

    /// A duration string could not be parsed.
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    /// The configuration could not be read or deserialized.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration was read but is not usable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<figment::Error> for CoreError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
