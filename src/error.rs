//! Top-level error type for report execution and rendering.
//!
//! Each layer has its own error enum (`ValidationError`, `StorageError`,
//! `SettingsError`); this is what callers of the executor and renderer see.
//! Transports should send [`ReportError::to_body`] rather than the error's
//! debug form.

use serde::{Deserialize, Serialize};

use crate::store::StorageError;
use crate::validation::ValidationError;

/// Result type for executor and renderer operations.
pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ReportError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Visualization error: {0}")]
    Visualization(String),
}

impl ReportError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::Validation(_) => ErrorKind::Validation,
            ReportError::NotFound { .. } => ErrorKind::NotFound,
            ReportError::Authorization(_) => ErrorKind::Authorization,
            ReportError::Execution(_) => ErrorKind::Execution,
            ReportError::Visualization(_) => ErrorKind::Visualization,
        }
    }

    /// Structured `{kind, message}` form for transports.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<StorageError> for ReportError {
    fn from(err: StorageError) -> Self {
        ReportError::Execution(err.to_string())
    }
}

/// Error category, stable across message wording changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Authorization,
    Execution,
    Visualization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}
