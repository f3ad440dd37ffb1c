//! Extraction error taxonomy.
//!
//! [`ExtractError`] classifies everything that can go wrong while pulling
//! data, and carries enough context to log the failing unit. The
//! [`ErrorScope`] tells the caller how much work the error invalidates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of an extraction error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Service call failed or returned an error sentinel.
    Transport,
    /// Service answered with an unexpected shape.
    MalformedResponse,
    /// A single record could not be normalized or filtered.
    Transform,
    /// Missing or invalid configuration.
    Config,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::MalformedResponse => "malformed_response",
            Self::Transform => "transform",
            Self::Config => "config",
        };
        f.write_str(s)
    }
}

/// Blast radius of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorScope {
    /// Aborts the whole run before any stream is processed.
    Run,
    /// Zeroes one window, day, or id batch; the loop moves on.
    Unit,
    /// Skips one record; the surrounding batch continues.
    Record,
}

impl fmt::Display for ErrorScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Run => "run",
            Self::Unit => "unit",
            Self::Record => "record",
        };
        f.write_str(s)
    }
}

fn record_suffix(record_id: &Option<String>) -> String {
    record_id
        .as_ref()
        .map(|id| format!(" for record {id}"))
        .unwrap_or_default()
}

/// Structured extraction error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("transport call {operation} failed: {message}")]
    Transport { operation: String, message: String },

    #[error("malformed response from {operation}: {message}")]
    MalformedResponse { operation: String, message: String },

    #[error("transform failed{}: {message}", record_suffix(.record_id))]
    Transform {
        record_id: Option<String>,
        message: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ExtractError {
    #[must_use]
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn malformed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation: operation.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transform(record_id: Option<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            record_id,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::MalformedResponse { .. } => ErrorCategory::MalformedResponse,
            Self::Transform { .. } => ErrorCategory::Transform,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    #[must_use]
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::Transport { .. } | Self::MalformedResponse { .. } => ErrorScope::Unit,
            Self::Transform { .. } => ErrorScope::Record,
            Self::Config(_) => ErrorScope::Run,
        }
    }

    /// Whether the error aborts the run instead of being logged and skipped.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.scope() == ErrorScope::Run
    }
}
