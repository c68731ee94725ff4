//! Error types for port configuration

use std::convert::Infallible;

use thiserror::Error;

/// Errors that can occur while building a port configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A setter was given a value outside the parameter's domain
    #[error("invalid value {value:?} for {parameter}")]
    InvalidParameterValue {
        /// Name of the parameter being set (e.g. "baud rate")
        parameter: &'static str,
        /// The rejected value as given
        value: String,
    },

    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),
}

impl ConfigError {
    pub(crate) fn invalid(parameter: &'static str, value: impl ToString) -> Self {
        Self::InvalidParameterValue {
            parameter,
            value: value.to_string(),
        }
    }
}

// Lets the setters accept already-typed values through `TryInto`.
impl From<Infallible> for ConfigError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}
