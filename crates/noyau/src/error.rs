use noyau_core::{CanvasError, ErrorCategory};
use noyau_data::DataSourceError;
use noyau_interaction::InteractionError;
use thiserror::Error;

/// Any error the engine's parts can report.
#[derive(Debug, Error)]
pub enum NoyauError {
    #[error("invalid configuration: {0}")]
    Config(serde_json::Error),

    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Interaction(#[from] InteractionError),
}

impl NoyauError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            NoyauError::Config(_) => ErrorCategory::Configuration,
            NoyauError::Canvas(e) => e.category(),
            NoyauError::DataSource(e) => e.category(),
            NoyauError::Interaction(e) => e.category(),
        }
    }
}
