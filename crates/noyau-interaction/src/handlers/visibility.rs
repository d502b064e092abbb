use super::target_node;
use crate::context::InteractionContext;
use crate::error::InteractionError;
use crate::handler::{ActionCategory, ActionHandler, ActionMetadata, ParamKind, ParamSchema};
use async_trait::async_trait;
use noyau_core::NodePatch;
use serde_json::{Value, json};

/// Shows or hides the target node. `animation` and `duration` are returned
/// as hints for the renderer; nothing is animated here.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeVisibility;

#[async_trait]
impl ActionHandler for ChangeVisibility {
    fn action_type(&self) -> &str {
        "changeVisibility"
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            action_type: self.action_type().into(),
            name: "Change visibility".into(),
            description: "Show or hide a component".into(),
            category: ActionCategory::Visibility,
            icon: Some("eye".into()),
            requires_target: true,
            params: vec![
                ParamSchema::new("targetNodeId", "Target component", ParamKind::String).required(),
                ParamSchema::new("visible", "Visible", ParamKind::Boolean).required(),
                ParamSchema::new("animation", "Animation", ParamKind::Select)
                    .with_options(&["none", "fade", "slide"])
                    .with_default(json!("none")),
                ParamSchema::new("duration", "Duration (ms)", ParamKind::Number).with_default(json!(300)),
            ],
        }
    }

    async fn execute(&self, ctx: &InteractionContext) -> Result<Value, InteractionError> {
        let target = target_node(ctx)?;
        let visible = ctx.param("visible").and_then(Value::as_bool).unwrap_or(true);
        ctx.update_node(target.id, NodePatch::visible(visible));
        Ok(json!({
            "targetNodeId": target.id.as_str(),
            "visible": visible,
            "animation": ctx.param("animation").cloned().unwrap_or(Value::Null),
            "duration": ctx.param("duration").cloned().unwrap_or(Value::Null),
        }))
    }
}
