//! Error types for agraph-core.
//!
//! The core distinguishes two families of problems:
//! - programmer/setup mistakes (bad configuration, unknown ids passed to a
//!   mutator) which are returned immediately as `AgError`
//! - data-quality problems (dangling anchors, containment violations) which
//!   are never errors at mutation time and are collected by the validator
//!   into a report instead
//!
//! Lookups return `Option` and never produce an error.

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type AgResult<T> = Result<T, AgError>;

/// Core error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgError {
    /// Invalid parameter values, missing required layers, inconsistent config.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An id passed to a mutator does not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// An internal invariant does not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// A transformer could not complete.
    #[error("transformation failed in {transformer}: {message}")]
    TransformationFailed { transformer: String, message: String },

    /// Encoding/decoding of model values failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AgError {
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn transformation_failed(transformer: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::TransformationFailed {
            transformer: transformer.into(),
            message: msg.into(),
        }
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// True for errors caused by caller setup rather than data.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for AgError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
