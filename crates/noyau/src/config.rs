use crate::error::NoyauError;
use noyau_core::StoreConfig;
use noyau_data::ExecutorConfig;
use noyau_interaction::EngineConfig;
use noyau_script::ScriptConfig;
use serde::{Deserialize, Serialize};

/// Settings for every part of the engine. Each section, and every field
/// inside it, falls back to its default when omitted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoyauConfig {
    pub store: StoreConfig,
    pub data: ExecutorConfig,
    pub interactions: EngineConfig,
    pub script: ScriptConfig,
}

impl NoyauConfig {
    pub fn from_json(json: &str) -> Result<Self, NoyauError> {
        serde_json::from_str(json).map_err(NoyauError::Config)
    }

    pub fn to_json(&self) -> Result<String, NoyauError> {
        serde_json::to_string_pretty(self).map_err(NoyauError::Config)
    }
}
