//! Unified error types for the relayset workspace
//!
//! This module provides a common error type [`RelayError`] that can represent
//! errors from any stage of a setpoint study. The three domain kinds map onto
//! the failure modes of the pipeline:
//!
//! - [`RelayError::SolverFailure`]: the fault solve did not converge or the
//!   request could not be served
//! - [`RelayError::InvalidInput`]: a required fault-current column or bus is
//!   missing, or a value is not a usable current
//! - [`RelayError::Configuration`]: the coefficient table or CT settings cannot
//!   serve a device role
//!
//! # Example
//!
//! ```ignore
//! use relayset_core::{RelayError, RelayResult};
//!
//! fn run(path: &str) -> RelayResult<()> {
//!     let network = load_topology(path)?;
//!     study(&network)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all relayset operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing columns, unknown buses, mismatched cases, unusable values
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Fault solver did not converge or rejected the request
    #[error("Solver failure: {0}")]
    SolverFailure(String),

    /// Coefficient table or CT settings cannot serve the request
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

impl RelayError {
    /// Short machine-readable kind, used in run manifests and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Io(_) => "io",
            RelayError::Parse(_) => "parse",
            RelayError::InvalidInput(_) => "invalid_input",
            RelayError::SolverFailure(_) => "solver_failure",
            RelayError::Configuration(_) => "configuration",
            RelayError::Other(_) => "other",
        }
    }

    /// Prefix the message with `ctx`, keeping the error kind.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            RelayError::Io(err) => RelayError::Other(format!("{ctx}: {err}")),
            RelayError::Parse(msg) => RelayError::Parse(format!("{ctx}: {msg}")),
            RelayError::InvalidInput(msg) => RelayError::InvalidInput(format!("{ctx}: {msg}")),
            RelayError::SolverFailure(msg) => RelayError::SolverFailure(format!("{ctx}: {msg}")),
            RelayError::Configuration(msg) => RelayError::Configuration(format!("{ctx}: {msg}")),
            RelayError::Other(msg) => RelayError::Other(format!("{ctx}: {msg}")),
        }
    }
}

/// Convenience type alias for Results using RelayError.
pub type RelayResult<T> = Result<T, RelayError>;

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::Other(err.to_string())
    }
}

impl From<String> for RelayError {
    fn from(s: String) -> Self {
        RelayError::Other(s)
    }
}

impl From<&str> for RelayError {
    fn from(s: &str) -> Self {
        RelayError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Parse(err.to_string())
    }
}
