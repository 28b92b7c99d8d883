//! Error handling for the gatemap parameter mapping library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. It uses `thiserror` for easy
//! error handling and implements conversions from common error types.
//!
//! # Examples
//!
//! ```
//! use gatemap_core::error::{Error, Result};
//!
//! fn must_have_name(name: &str) -> Result<()> {
//!     if name.trim().is_empty() {
//!         return Err(Error::invalid_name(name));
//!     }
//!     Ok(())
//! }
//!
//! assert!(must_have_name("id").is_ok());
//! assert!(must_have_name(" ").is_err());
//! ```

use thiserror::Error;

/// Result type for gatemap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gatemap operations
#[derive(Debug, Error)]
pub enum Error {
    /// A route template contains a placeholder that cannot become a parameter
    #[error("Malformed route template '{template}': segment '{segment}' {reason}")]
    MalformedTemplate {
        template: String,
        segment: String,
        reason: String,
    },

    /// Parameter names must contain at least one non-whitespace character
    #[error("Invalid parameter name: {0:?}")]
    InvalidName(String),

    /// A descriptor list would produce an inconsistent mapping set
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new malformed template error
    pub fn malformed_template<T, S, R>(template: T, segment: S, reason: R) -> Self
    where
        T: Into<String>,
        S: Into<String>,
        R: Into<String>,
    {
        Self::MalformedTemplate {
            template: template.into(),
            segment: segment.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid name error
    pub fn invalid_name<S: Into<String>>(name: S) -> Self {
        Self::InvalidName(name.into())
    }

    /// Create a new invariant violation error
    pub fn invariant<S: Into<String>>(msg: S) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}
