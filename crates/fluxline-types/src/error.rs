//! Structured error model for stage failures.
//!
//! [`StageError`] is what a stage returns when it cannot process a batch at
//! all (as opposed to rejecting individual records, which flow to the error
//! sink). Construct via the kind-specific factory methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    /// Invalid stage configuration.
    Config,
    /// Failure talking to the external system the stage fronts.
    Connection,
    /// Invalid or corrupt data the stage could not work around.
    Data,
    /// Internal stage error.
    Internal,
}

impl fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Connection => "connection",
            Self::Data => "data",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Structured error from a stage's batch processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{kind}] {code}: {message}")]
pub struct StageError {
    pub kind: StageErrorKind,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl StageError {
    fn new(kind: StageErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Configuration error.
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Config, code, message)
    }

    /// External-system connection error.
    #[must_use]
    pub fn connection(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Connection, code, message)
    }

    /// Data error the stage could not work around.
    #[must_use]
    pub fn data(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Data, code, message)
    }

    /// Internal stage error.
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StageErrorKind::Internal, code, message)
    }

    /// Attach structured diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
