use super::mismatch;
use crate::config::{DataSourceConfig, SourceKind};
use crate::error::DataSourceError;
use crate::provider::{DataSourceProvider, ProviderContext, PullSource, SourceDriver};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A constant value. Polling has no effect and there is nothing to clean up.
pub struct StaticProvider;

struct StaticPull {
    value: Value,
}

#[async_trait]
impl PullSource for StaticPull {
    async fn fetch(&self) -> Result<Value, DataSourceError> {
        Ok(self.value.clone())
    }

    fn polls(&self) -> bool {
        false
    }
}

impl DataSourceProvider for StaticProvider {
    fn kind(&self) -> &str {
        "static"
    }

    fn validate(&self, config: &DataSourceConfig) -> Result<(), DataSourceError> {
        match &config.source {
            SourceKind::Static(_) => Ok(()),
            other => Err(mismatch("static", other.type_name())),
        }
    }

    fn create(&self, config: &DataSourceConfig, _ctx: &ProviderContext) -> Result<SourceDriver, DataSourceError> {
        let SourceKind::Static(source) = &config.source else {
            return Err(mismatch("static", config.type_name()));
        };
        Ok(SourceDriver::Pull(Arc::new(StaticPull {
            value: source.value.clone(),
        })))
    }
}
