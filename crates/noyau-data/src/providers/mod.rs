//! Built-in providers.

mod http;
mod script;
mod static_source;
mod websocket;

pub use http::HttpProvider;
pub use script::ScriptProvider;
pub use static_source::StaticProvider;
pub use websocket::WebSocketProvider;

use crate::error::DataSourceError;

fn mismatch(expected: &str, got: &str) -> DataSourceError {
    DataSourceError::Validation(format!("expected a `{expected}` config, got `{got}`"))
}
