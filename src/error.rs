//! Error types for the recordar crate.

use std::fmt;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, RecordarError>;

/// Errors reported by stream classifiers and their helpers.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordarError {
    /// A hyperparameter is outside its valid range.
    InvalidHyperparameter {
        /// Name of the offending parameter.
        name: String,
        /// The rejected value, rendered as text.
        value: String,
        /// Human-readable constraint, e.g. "must be >= 1".
        constraint: String,
    },

    /// An operation requires a model context that has not been set.
    NoContext,

    /// Anything else.
    Other(String),
}

impl fmt::Display for RecordarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHyperparameter {
                name,
                value,
                constraint,
            } => {
                write!(f, "invalid hyperparameter {name}={value}: {constraint}")
            }
            Self::NoContext => {
                write!(f, "no model context: call set_context() before training")
            }
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for RecordarError {}

impl From<&str> for RecordarError {
    fn from(msg: &str) -> Self {
        Self::Other(msg.to_string())
    }
}

impl From<String> for RecordarError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}
