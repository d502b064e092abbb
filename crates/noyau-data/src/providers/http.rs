//! HTTP polling source on `reqwest`.
//!
//! Non-2xx responses are fetch failures. A JSON body is parsed; anything
//! else is published as a string. `dataPath` then picks a sub-value.
//! Aborting the fetch task drops the in-flight request.

use super::mismatch;
use crate::config::{DataSourceConfig, HttpSource, SourceKind};
use crate::error::DataSourceError;
use crate::provider::{DataSourceProvider, ProviderContext, PullSource, SourceDriver};
use async_trait::async_trait;
use noyau_core::DataPath;
use reqwest::{Method, Url};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub struct HttpProvider;

struct HttpPull {
    client: reqwest::Client,
    source: HttpSource,
    method: Method,
    path: DataPath,
    timeout: Duration,
}

#[async_trait]
impl PullSource for HttpPull {
    async fn fetch(&self) -> Result<Value, DataSourceError> {
        let mut request = self
            .client
            .request(self.method.clone(), &self.source.url)
            .timeout(self.timeout);
        if !self.source.params.is_empty() {
            request = request.query(&self.source.params);
        }
        for (name, value) in &self.source.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        match &self.source.body {
            Some(Value::String(text)) => request = request.body(text.clone()),
            Some(body) => request = request.json(body),
            None => {}
        }

        log::debug!("{} {}", self.method, self.source.url);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DataSourceError::Fetch(format!("{} returned {status}", self.source.url)));
        }
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok(self.path.resolve(&body).cloned().unwrap_or(Value::Null))
    }
}

fn parse_method(method: &str) -> Result<Method, DataSourceError> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| DataSourceError::Validation(format!("invalid HTTP method `{method}`")))
}

impl DataSourceProvider for HttpProvider {
    fn kind(&self) -> &str {
        "http"
    }

    fn validate(&self, config: &DataSourceConfig) -> Result<(), DataSourceError> {
        let SourceKind::Http(source) = &config.source else {
            return Err(mismatch("http", config.type_name()));
        };
        let url = Url::parse(&source.url)
            .map_err(|e| DataSourceError::Validation(format!("invalid url `{}`: {e}", source.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DataSourceError::Validation(format!("unsupported scheme `{}`", url.scheme())));
        }
        parse_method(&source.method)?;
        if let Some(path) = &source.data_path {
            DataPath::parse(path)?;
        }
        Ok(())
    }

    fn create(&self, config: &DataSourceConfig, ctx: &ProviderContext) -> Result<SourceDriver, DataSourceError> {
        self.validate(config)?;
        let SourceKind::Http(source) = &config.source else {
            return Err(mismatch("http", config.type_name()));
        };
        let path = match &source.data_path {
            Some(p) => DataPath::parse(p)?,
            None => DataPath::default(),
        };
        let timeout = source.timeout.unwrap_or(ctx.settings.default_http_timeout_ms);
        Ok(SourceDriver::Pull(Arc::new(HttpPull {
            client: ctx.http.clone(),
            source: source.clone(),
            method: parse_method(&source.method)?,
            path,
            timeout: Duration::from_millis(timeout),
        })))
    }
}
