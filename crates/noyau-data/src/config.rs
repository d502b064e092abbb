//! Declarative data-source configuration.
//!
//! A config is a tagged union on `type`; the common fields sit beside the
//! tag. Two configs that serialize identically share one live instance, so
//! every map in here is ordered.

use noyau_core::JsonMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Poll period in milliseconds; 0 disables polling.
    #[serde(default)]
    pub poll_interval: u64,
    /// Lua function body applied to every fetched value, bound as `data`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_script: Option<String>,
    #[serde(flatten)]
    pub source: SourceKind,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceKind {
    #[serde(rename = "static")]
    Static(StaticSource),
    #[serde(rename = "http")]
    Http(HttpSource),
    #[serde(rename = "websocket")]
    WebSocket(WebSocketSource),
    #[serde(rename = "script")]
    Script(ScriptSource),
    #[serde(rename = "device-api")]
    DeviceApi(DeviceApiSource),
}

impl SourceKind {
    /// The `type` tag, used to resolve a provider.
    pub fn type_name(&self) -> &'static str {
        match self {
            SourceKind::Static(_) => "static",
            SourceKind::Http(_) => "http",
            SourceKind::WebSocket(_) => "websocket",
            SourceKind::Script(_) => "script",
            SourceKind::DeviceApi(_) => "device-api",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticSource {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSource {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Query-string parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Request timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSocketSource {
    pub url: String,
    /// Sent once after every successful connect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe_message: Option<Value>,
    /// Lua expression over `message`; falsy results drop the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_reconnect_attempts: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSource {
    /// Lua function body, called with `params` on every fetch.
    pub script: String,
    #[serde(default)]
    pub params: JsonMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceApiSource {
    pub device_id: String,
    pub metric: String,
    #[serde(default)]
    pub options: JsonMap,
}

impl DataSourceConfig {
    pub fn new(source: SourceKind) -> Self {
        Self {
            name: String::new(),
            enabled: true,
            poll_interval: 0,
            transform_script: None,
            source,
        }
    }

    pub fn constant(value: Value) -> Self {
        Self::new(SourceKind::Static(StaticSource { value }))
    }

    pub fn http(url: &str) -> Self {
        Self::new(SourceKind::Http(HttpSource {
            url: url.to_string(),
            method: default_method(),
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            body: None,
            timeout: None,
            data_path: None,
        }))
    }

    pub fn websocket(url: &str) -> Self {
        Self::new(SourceKind::WebSocket(WebSocketSource {
            url: url.to_string(),
            subscribe_message: None,
            message_filter: None,
            data_path: None,
            reconnect_interval: None,
            max_reconnect_attempts: None,
        }))
    }

    pub fn script(script: &str, params: JsonMap) -> Self {
        Self::new(SourceKind::Script(ScriptSource {
            script: script.to_string(),
            params,
        }))
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval = ms;
        self
    }

    pub fn with_transform(mut self, script: &str) -> Self {
        self.transform_script = Some(script.to_string());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.source.type_name()
    }

    /// Canonical serialized form; equal keys share an instance.
    pub fn share_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Executor tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutorConfig {
    pub default_http_timeout_ms: u64,
    pub reconnect_interval_ms: u64,
    pub max_reconnect_attempts: u32,
    /// Capacity of the update-event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_http_timeout_ms: 10_000,
            reconnect_interval_ms: 3_000,
            max_reconnect_attempts: 5,
            event_capacity: 256,
        }
    }
}
