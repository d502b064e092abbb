//! The action handler seam and the metadata handlers describe themselves with.

use crate::context::InteractionContext;
use crate::error::InteractionError;
use async_trait::async_trait;
use noyau_core::{InteractionResponse, JsonMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    Select,
    Json,
}

impl ParamKind {
    pub fn name(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::Select => "select",
            ParamKind::Json => "json",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::String | ParamKind::Select => value.is_string(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
            ParamKind::Json => true,
        }
    }
}

/// Describes one handler param, for validation and for editors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSchema {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParamSchema {
    pub fn new(name: &str, label: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            required: false,
            default_value: None,
            options: Vec::new(),
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Navigation,
    Data,
    Visibility,
    Feedback,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadata {
    pub action_type: String,
    pub name: String,
    pub description: String,
    pub category: ActionCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub requires_target: bool,
    #[serde(default)]
    pub params: Vec<ParamSchema>,
}

impl ActionMetadata {
    pub fn param(&self, name: &str) -> Option<&ParamSchema> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// A pluggable interaction action, registered under its [`action_type`].
///
/// [`action_type`]: ActionHandler::action_type
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn action_type(&self) -> &str;

    fn metadata(&self) -> ActionMetadata;

    /// Check resolved params before execution. The default checks them
    /// against [`metadata`](ActionHandler::metadata).
    fn validate_params(&self, params: &JsonMap) -> Result<(), InteractionError> {
        validate_against(&self.metadata(), params)
    }

    async fn execute(&self, ctx: &InteractionContext) -> Result<Value, InteractionError>;
}

/// Required params must be present (non-empty for strings), typed params
/// must match their kind, and select params must be one of their options.
pub fn validate_against(metadata: &ActionMetadata, params: &JsonMap) -> Result<(), InteractionError> {
    for schema in &metadata.params {
        let value = params.get(&schema.name).filter(|v| !v.is_null());
        let Some(value) = value else {
            if schema.required {
                return Err(missing(metadata, schema));
            }
            continue;
        };
        if schema.required && value.as_str().is_some_and(|s| s.trim().is_empty()) {
            return Err(missing(metadata, schema));
        }
        if !schema.kind.accepts(value) {
            return Err(InteractionError::InvalidParam {
                action: metadata.action_type.clone(),
                param: schema.name.clone(),
                message: format!("expected {}, got {value}", schema.kind.name()),
            });
        }
        if schema.kind == ParamKind::Select
            && !schema.options.is_empty()
            && !value.as_str().is_some_and(|s| schema.options.iter().any(|o| o == s))
        {
            return Err(InteractionError::InvalidParam {
                action: metadata.action_type.clone(),
                param: schema.name.clone(),
                message: format!("must be one of {}", schema.options.join(", ")),
            });
        }
    }
    Ok(())
}

fn missing(metadata: &ActionMetadata, schema: &ParamSchema) -> InteractionError {
    InteractionError::MissingParam {
        action: metadata.action_type.clone(),
        param: schema.name.clone(),
    }
}

/// Params a handler actually sees: the response's own, then schema
/// defaults for anything missing, then the response's `targetNodeId` if
/// the params do not name one.
pub fn resolve_params(metadata: &ActionMetadata, response: &InteractionResponse) -> JsonMap {
    let mut params = response.params.clone().unwrap_or_default();
    for schema in &metadata.params {
        if let Some(default) = &schema.default_value
            && params.get(&schema.name).is_none_or(Value::is_null)
        {
            params.insert(schema.name.clone(), default.clone());
        }
    }
    if let Some(target) = response.target_node_id
        && params.get("targetNodeId").is_none_or(Value::is_null)
    {
        params.insert("targetNodeId".into(), Value::String(target.as_str().to_string()));
    }
    params
}
