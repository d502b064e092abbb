use super::mismatch;
use crate::config::{DataSourceConfig, ScriptSource, SourceKind};
use crate::error::DataSourceError;
use crate::provider::{DataSourceProvider, ProviderContext, PullSource, SourceDriver};
use async_trait::async_trait;
use noyau_core::JsonMap;
use noyau_script::CompiledScript;
use serde_json::Value;
use std::sync::Arc;

/// User code producing a value. Compiled once at bind time so syntax
/// errors block activation; runtime errors land on the instance.
pub struct ScriptProvider;

struct ScriptPull {
    script: CompiledScript,
    params: Value,
}

#[async_trait]
impl PullSource for ScriptPull {
    async fn fetch(&self) -> Result<Value, DataSourceError> {
        let mut bindings = JsonMap::new();
        bindings.insert("params".into(), self.params.clone());
        Ok(self.script.call(&bindings)?)
    }
}

fn source(config: &DataSourceConfig) -> Result<&ScriptSource, DataSourceError> {
    match &config.source {
        SourceKind::Script(s) => Ok(s),
        other => Err(mismatch("script", other.type_name())),
    }
}

impl DataSourceProvider for ScriptProvider {
    fn kind(&self) -> &str {
        "script"
    }

    fn validate(&self, config: &DataSourceConfig) -> Result<(), DataSourceError> {
        if source(config)?.script.trim().is_empty() {
            return Err(DataSourceError::Validation("script must not be empty".into()));
        }
        Ok(())
    }

    fn create(&self, config: &DataSourceConfig, ctx: &ProviderContext) -> Result<SourceDriver, DataSourceError> {
        self.validate(config)?;
        let source = source(config)?;
        let script = ctx.scripts.compile_function(&source.script, &["params"])?;
        Ok(SourceDriver::Pull(Arc::new(ScriptPull {
            script,
            params: Value::Object(source.params.clone()),
        })))
    }
}
