use noyau_core::{ErrorCategory, NodeId};
use noyau_script::ScriptError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InteractionError {
    #[error("no handler registered for action `{action}`")]
    UnknownAction { action: String },

    #[error("{action}: missing required param `{param}`")]
    MissingParam { action: String, param: String },

    #[error("{action}: invalid param `{param}`: {message}")]
    InvalidParam {
        action: String,
        param: String,
        message: String,
    },

    #[error("invalid interaction: {0}")]
    InvalidDefinition(String),

    #[error("expression error: {0}")]
    Expression(#[from] ScriptError),

    #[error("target node `{0}` not found")]
    TargetNotFound(NodeId),

    #[error("{action} failed: {message}")]
    Execution { action: String, message: String },
}

impl InteractionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            InteractionError::UnknownAction { .. } => ErrorCategory::Configuration,
            InteractionError::MissingParam { .. }
            | InteractionError::InvalidParam { .. }
            | InteractionError::InvalidDefinition(_) => ErrorCategory::Validation,
            InteractionError::Expression(e) => e.category(),
            InteractionError::TargetNotFound(_) | InteractionError::Execution { .. } => ErrorCategory::Runtime,
        }
    }
}
