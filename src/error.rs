// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client error types, one variant per failure class of the submission workflow.

use std::time::Duration;

/// Error returned by every trekkie workflow step.
#[derive(Debug, thiserror::Error)]
pub enum TrekkieError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("GPX upload failed: {0}")]
    Upload(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Submission rejected: {0}")]
    Submission(String),

    #[error("Run not found: {0}")]
    NotFound(String),

    #[error("No response within {timeout:?} while trying to {step}")]
    Timeout {
        step: &'static str,
        timeout: Duration,
    },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TrekkieError {
    /// Stable machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            TrekkieError::Auth(_) => "auth_error",
            TrekkieError::Upload(_) => "upload_error",
            TrekkieError::Validation(_) => "validation_error",
            TrekkieError::Submission(_) => "submission_error",
            TrekkieError::NotFound(_) => "not_found",
            TrekkieError::Timeout { .. } => "timeout",
            TrekkieError::Internal(_) => "internal_error",
        }
    }

    /// Whether the step ran out of time rather than being rejected by the server.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TrekkieError::Timeout { .. })
    }
}

impl From<validator::ValidationErrors> for TrekkieError {
    fn from(errors: validator::ValidationErrors) -> Self {
        TrekkieError::Validation(errors.to_string())
    }
}

/// Result type alias for workflow steps
pub type Result<T> = std::result::Result<T, TrekkieError>;
