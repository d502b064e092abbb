use noyau_core::ErrorCategory;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScriptError {
    /// The source does not compile.
    #[error("syntax error: {0}")]
    Syntax(String),
    /// The script raised (or ran out of memory) while executing.
    #[error("script error: {0}")]
    Runtime(String),
    /// A value could not cross the JSON/Lua boundary.
    #[error("conversion error: {0}")]
    Conversion(String),
}

impl ScriptError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScriptError::Syntax(_) => ErrorCategory::Validation,
            ScriptError::Runtime(_) | ScriptError::Conversion(_) => ErrorCategory::Runtime,
        }
    }
}

impl From<mlua::Error> for ScriptError {
    fn from(err: mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => ScriptError::Syntax(message),
            mlua::Error::FromLuaConversionError { .. } | mlua::Error::ToLuaConversionError { .. } => {
                ScriptError::Conversion(err.to_string())
            }
            mlua::Error::SerializeError(message) | mlua::Error::DeserializeError(message) => {
                ScriptError::Conversion(message)
            }
            other => ScriptError::Runtime(other.to_string()),
        }
    }
}
