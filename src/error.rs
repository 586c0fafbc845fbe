//! Error types shared across the report store and the assistant backend.

use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the report store.
#[derive(Debug, Error)]
pub enum ReportError {
    /// A required field was missing; nothing was written.
    #[error("{0}")]
    Validation(String),
    /// The database could not complete the operation.
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

impl ReportError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReportError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ReportError::Validation(_))
    }
}

/// Failures from the text generation backend. These never reach the end user;
/// the gateway turns them into a fallback reply.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("generation backend unreachable: {0}")]
    Unavailable(#[from] reqwest::Error),
    #[error("generation backend timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid generation backend response: {0}")]
    InvalidResponse(String),
}
