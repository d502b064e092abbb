//! The provider seam: one [`DataSourceProvider`] per config `type`.
//!
//! A provider validates configs of its type and turns them into a
//! [`SourceDriver`]. Pull drivers are fetched by the executor (initial
//! fetch, poll ticks, manual refresh); push drivers own a long-lived task
//! and publish through a [`SourceLink`] whenever they have something.

use crate::config::{DataSourceConfig, ExecutorConfig};
use crate::error::DataSourceError;
use crate::instance::SourceLink;
use async_trait::async_trait;
use noyau_script::ScriptEngine;
use serde_json::Value;
use std::sync::Arc;

#[async_trait]
pub trait PullSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, DataSourceError>;

    /// Whether `pollInterval` applies to this source.
    fn polls(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait PushSource: Send + Sync {
    /// Runs until the source gives up for good or the task is aborted.
    async fn run(&self, link: SourceLink);
}

#[derive(Clone)]
pub enum SourceDriver {
    Pull(Arc<dyn PullSource>),
    Push(Arc<dyn PushSource>),
}

/// Shared services handed to providers at create time.
#[derive(Clone)]
pub struct ProviderContext {
    pub scripts: ScriptEngine,
    pub http: reqwest::Client,
    pub settings: ExecutorConfig,
}

pub trait DataSourceProvider: Send + Sync {
    /// The config `type` this provider serves.
    fn kind(&self) -> &str;

    /// Static checks run before anything is created.
    fn validate(&self, config: &DataSourceConfig) -> Result<(), DataSourceError>;

    fn create(&self, config: &DataSourceConfig, ctx: &ProviderContext) -> Result<SourceDriver, DataSourceError>;
}
