//! Noyau expression evaluator.
//!
//! Conditions, WebSocket message filters, value expressions, transform
//! scripts and script data sources all compile through [`ScriptEngine`]
//! into a sandboxed Lua state instead of evaluating host-language source.

mod engine;
mod error;

pub use engine::{CompiledScript, ScriptConfig, ScriptEngine, is_truthy};
pub use error::ScriptError;
