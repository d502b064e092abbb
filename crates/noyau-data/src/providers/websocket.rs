//! Push-driven WebSocket source on `tokio-tungstenite`.
//!
//! After connecting it sends the optional subscribe message, then every
//! inbound text/binary frame is parsed (JSON, else string), filtered by
//! `messageFilter`, narrowed by `dataPath` and published. On close or
//! connect failure it waits `reconnectInterval` and tries again; the
//! attempt counter resets on every successful connect. Past
//! `maxReconnectAttempts` consecutive failures the instance goes to a
//! terminal error.

use super::mismatch;
use crate::config::{DataSourceConfig, SourceKind, WebSocketSource};
use crate::error::DataSourceError;
use crate::instance::SourceLink;
use crate::provider::{DataSourceProvider, ProviderContext, PushSource, SourceDriver};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use noyau_core::{DataPath, JsonMap};
use noyau_script::CompiledScript;
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

pub struct WebSocketProvider;

struct WebSocketPush {
    url: String,
    subscribe: Option<String>,
    filter: Option<CompiledScript>,
    path: DataPath,
    reconnect_interval: Duration,
    max_attempts: u32,
}

impl WebSocketPush {
    /// Handle one frame; `None` when it should be dropped.
    fn process(&self, message: Message) -> Option<Value> {
        let text = match message {
            Message::Text(text) => text.as_str().to_owned(),
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            _ => return None,
        };
        let parsed = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if let Some(filter) = &self.filter {
            let mut bindings = JsonMap::new();
            bindings.insert("message".into(), parsed.clone());
            match filter.call_truthy(&bindings) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => {
                    log::warn!("{}: message filter failed: {err}", self.url);
                    return None;
                }
            }
        }
        Some(self.path.resolve(&parsed).cloned().unwrap_or(Value::Null))
    }

    /// One connection's lifetime. Returns once the socket closes;
    /// `connected` is set as soon as the handshake succeeds.
    async fn session(&self, link: &SourceLink, connected: &mut bool) -> Result<(), DataSourceError> {
        let (socket, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        *connected = true;
        log::info!("websocket connected: {}", self.url);
        let (mut sink, mut frames) = socket.split();
        if let Some(subscribe) = &self.subscribe {
            sink.send(Message::text(subscribe.clone())).await?;
        }
        while let Some(frame) = frames.next().await {
            let frame = frame?;
            if frame.is_close() {
                break;
            }
            if let Some(value) = self.process(frame) {
                link.publish(value);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PushSource for WebSocketPush {
    async fn run(&self, link: SourceLink) {
        let mut attempts: u32 = 0;
        loop {
            let mut connected = false;
            let reason = match self.session(&link, &mut connected).await {
                Ok(()) => "connection closed".to_string(),
                Err(err) => err.to_string(),
            };
            if link.is_stopped() {
                return;
            }
            if connected {
                attempts = 0;
            }
            attempts += 1;
            if attempts > self.max_attempts {
                let err = DataSourceError::Fetch(format!(
                    "{}: giving up after {} reconnect attempts ({reason})",
                    self.url, self.max_attempts
                ));
                link.fail_terminal(&err);
                return;
            }
            log::warn!(
                "{}: {reason}; reconnecting in {:?} ({attempts}/{})",
                self.url,
                self.reconnect_interval,
                self.max_attempts
            );
            link.fail(&DataSourceError::Fetch(reason));
            tokio::time::sleep(self.reconnect_interval).await;
            link.loading();
        }
    }
}

fn source(config: &DataSourceConfig) -> Result<&WebSocketSource, DataSourceError> {
    match &config.source {
        SourceKind::WebSocket(s) => Ok(s),
        other => Err(mismatch("websocket", other.type_name())),
    }
}

impl DataSourceProvider for WebSocketProvider {
    fn kind(&self) -> &str {
        "websocket"
    }

    fn validate(&self, config: &DataSourceConfig) -> Result<(), DataSourceError> {
        let source = source(config)?;
        let url = Url::parse(&source.url)
            .map_err(|e| DataSourceError::Validation(format!("invalid url `{}`: {e}", source.url)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(DataSourceError::Validation(format!("unsupported scheme `{}`", url.scheme())));
        }
        if let Some(path) = &source.data_path {
            DataPath::parse(path)?;
        }
        Ok(())
    }

    fn create(&self, config: &DataSourceConfig, ctx: &ProviderContext) -> Result<SourceDriver, DataSourceError> {
        self.validate(config)?;
        let source = source(config)?;
        let filter = source
            .message_filter
            .as_deref()
            .map(|expr| ctx.scripts.compile_expression(expr, &["message"]))
            .transpose()?;
        let subscribe = source.subscribe_message.as_ref().map(|m| match m {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        });
        let path = match &source.data_path {
            Some(p) => DataPath::parse(p)?,
            None => DataPath::default(),
        };
        Ok(SourceDriver::Push(Arc::new(WebSocketPush {
            url: source.url.clone(),
            subscribe,
            filter,
            path,
            reconnect_interval: Duration::from_millis(
                source.reconnect_interval.unwrap_or(ctx.settings.reconnect_interval_ms),
            ),
            max_attempts: source
                .max_reconnect_attempts
                .unwrap_or(ctx.settings.max_reconnect_attempts),
        })))
    }
}
