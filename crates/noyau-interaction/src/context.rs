//! Everything a handler sees when it runs.

use crate::expressions::Expressions;
use crate::host::InteractionHost;
use noyau_core::{CanvasNode, InteractionResponse, JsonMap, NodeId, NodePatch};
use noyau_script::ScriptError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub duration_ms: u64,
}

/// Presents notifications. Optional: without one, notifications are logged.
pub trait NotificationHandler: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Performs navigation. Optional: without one, navigation is logged.
pub trait Navigator: Send + Sync {
    fn navigate(&self, url: &str, target: &str);
}

/// Caller-supplied context for one trigger: JSON values visible to
/// conditions as `extra`, plus optional UI collaborators.
#[derive(Clone, Default)]
pub struct ExtraContext {
    pub values: JsonMap,
    pub notification_handler: Option<Arc<dyn NotificationHandler>>,
    pub navigator: Option<Arc<dyn Navigator>>,
}

impl ExtraContext {
    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn with_notification_handler(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.notification_handler = Some(handler);
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }
}

impl fmt::Debug for ExtraContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtraContext")
            .field("values", &self.values)
            .field("notification_handler", &self.notification_handler.is_some())
            .field("navigator", &self.navigator.is_some())
            .finish()
    }
}

/// Built per response, right before its handler executes.
pub struct InteractionContext {
    pub source_node: CanvasNode,
    pub interaction_id: String,
    pub response: InteractionResponse,
    /// Resolved params: response params, then schema defaults, then the
    /// response's `targetNodeId`.
    pub params: JsonMap,
    pub event: Value,
    pub extra: ExtraContext,
    pub(crate) host: Arc<dyn InteractionHost>,
    pub(crate) expressions: Arc<Expressions>,
}

impl InteractionContext {
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key).filter(|v| !v.is_null())
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.param(key).and_then(Value::as_str)
    }

    pub fn get_node(&self, id: NodeId) -> Option<CanvasNode> {
        self.host.get_node(id)
    }

    pub fn update_node(&self, id: NodeId, patch: NodePatch) {
        self.host.update_node(id, patch);
    }

    pub fn trigger_interaction(&self, id: NodeId, event: &str) {
        self.host.trigger_interaction(id, event);
    }

    /// Evaluate an expression with the given names in scope.
    pub fn evaluate(&self, expr: &str, scope: &JsonMap) -> Result<Value, ScriptError> {
        self.expressions.evaluate(expr, scope)
    }
}
