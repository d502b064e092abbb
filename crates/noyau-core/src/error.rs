use crate::id::NodeId;
use thiserror::Error;

/// Coarse classification shared by every Noyau error type.
///
/// - `Validation`: bad input caught before anything is activated.
/// - `Runtime`: a failure while running (fetch, script, handler).
/// - `Configuration`: an unknown provider or action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Runtime,
    Configuration,
}

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("invalid node: {0}")]
    InvalidNode(String),

    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("invalid data path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("binary decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl CanvasError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CanvasError::Encode(_) => ErrorCategory::Runtime,
            _ => ErrorCategory::Validation,
        }
    }
}
