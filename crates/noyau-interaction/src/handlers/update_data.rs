use super::target_node;
use crate::context::InteractionContext;
use crate::error::InteractionError;
use crate::handler::{ActionCategory, ActionHandler, ActionMetadata, ParamKind, ParamSchema};
use async_trait::async_trait;
use noyau_core::{JsonMap, NodePatch};
use serde_json::{Value, json};

/// Writes one key of the target node's `data`, either a literal `value` or
/// the result of `valueExpression` over `sourceNode`, `targetNode` and
/// `event`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateComponentData;

#[async_trait]
impl ActionHandler for UpdateComponentData {
    fn action_type(&self) -> &str {
        "updateComponentData"
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            action_type: self.action_type().into(),
            name: "Update component data".into(),
            description: "Set a data field on another component".into(),
            category: ActionCategory::Data,
            icon: Some("database".into()),
            requires_target: true,
            params: vec![
                ParamSchema::new("targetNodeId", "Target component", ParamKind::String).required(),
                ParamSchema::new("dataKey", "Data key", ParamKind::String).required(),
                ParamSchema::new("value", "Value", ParamKind::Json),
                ParamSchema::new("valueExpression", "Value expression", ParamKind::String)
                    .with_description("Evaluated with sourceNode, targetNode and event; wins over value"),
            ],
        }
    }

    async fn execute(&self, ctx: &InteractionContext) -> Result<Value, InteractionError> {
        let target = target_node(ctx)?;
        let data_key = ctx.str_param("dataKey").unwrap_or_default();

        let value = match ctx.str_param("valueExpression").filter(|e| !e.trim().is_empty()) {
            Some(expr) => {
                let mut scope = JsonMap::new();
                scope.insert("sourceNode".into(), serde_json::to_value(&ctx.source_node).unwrap_or_default());
                scope.insert("targetNode".into(), serde_json::to_value(&target).unwrap_or_default());
                scope.insert("event".into(), ctx.event.clone());
                ctx.evaluate(expr, &scope)?
            }
            None => ctx.param("value").cloned().unwrap_or(Value::Null),
        };

        let mut data = target.data.clone();
        data.insert(data_key.to_string(), value.clone());
        ctx.update_node(target.id, NodePatch::data(data));
        Ok(json!({ "targetNodeId": target.id.as_str(), "dataKey": data_key, "value": value }))
    }
}
