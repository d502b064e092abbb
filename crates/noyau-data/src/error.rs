use noyau_core::{CanvasError, ErrorCategory};
use noyau_script::ScriptError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("invalid data source config: {0}")]
    Validation(String),
    #[error("no provider registered for data source type `{0}`")]
    UnknownProvider(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Path(#[from] CanvasError),
}

impl DataSourceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DataSourceError::Validation(_) | DataSourceError::Path(_) => ErrorCategory::Validation,
            DataSourceError::UnknownProvider(_) => ErrorCategory::Configuration,
            DataSourceError::Fetch(_) | DataSourceError::Http(_) | DataSourceError::WebSocket(_) => {
                ErrorCategory::Runtime
            }
            DataSourceError::Script(e) => e.category(),
        }
    }

    /// Whether binding should fail outright rather than record an error
    /// on the instance.
    pub fn blocks_activation(&self) -> bool {
        self.category() != ErrorCategory::Runtime
    }
}
