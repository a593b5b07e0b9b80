//! Remote store errors
//!
//! Per-key errors (`AlreadyExists`, `NotFound`, `Rejected`) leave the store
//! usable. Systemic errors mean the store may be unreachable or half-written
//! and nothing further should be sent to it.

use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// Put without overwrite hit an existing parameter
    #[error("parameter {0} already exists")]
    AlreadyExists(String),

    /// Delete hit a missing parameter
    #[error("parameter {0} not found")]
    NotFound(String),

    /// The store refused this one request (bad name, value too large, ...)
    #[error("parameter {path} rejected: {reason}")]
    Rejected { path: String, reason: String },

    #[error("{operation} timed out after {}s", .after.as_secs_f32())]
    Timeout { operation: String, after: Duration },

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),
}

impl RemoteError {
    /// Whether the error should abort everything still queued against the store
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            RemoteError::Timeout { .. } | RemoteError::Unavailable(_) | RemoteError::Unauthorized(_)
        )
    }
}
