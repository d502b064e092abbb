use crate::context::{InteractionContext, Notification, NotificationKind};
use crate::error::InteractionError;
use crate::handler::{ActionCategory, ActionHandler, ActionMetadata, ParamKind, ParamSchema};
use async_trait::async_trait;
use serde_json::{Value, json};

pub const DEFAULT_DURATION_MS: u64 = 3000;

/// Hands a [`Notification`] to the caller's notification handler, or logs
/// it when none is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowNotification;

#[async_trait]
impl ActionHandler for ShowNotification {
    fn action_type(&self) -> &str {
        "showNotification"
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            action_type: self.action_type().into(),
            name: "Show notification".into(),
            description: "Display a toast message".into(),
            category: ActionCategory::Feedback,
            icon: Some("bell".into()),
            requires_target: false,
            params: vec![
                ParamSchema::new("title", "Title", ParamKind::String).required(),
                ParamSchema::new("message", "Message", ParamKind::String),
                ParamSchema::new("type", "Type", ParamKind::Select)
                    .with_options(&["info", "success", "warning", "error"])
                    .with_default(json!("info")),
                ParamSchema::new("duration", "Duration (ms)", ParamKind::Number)
                    .with_default(json!(DEFAULT_DURATION_MS)),
            ],
        }
    }

    async fn execute(&self, ctx: &InteractionContext) -> Result<Value, InteractionError> {
        let kind: NotificationKind = ctx
            .param("type")
            .and_then(|t| serde_json::from_value(t.clone()).ok())
            .unwrap_or_default();
        let notification = Notification {
            title: ctx.str_param("title").unwrap_or_default().to_string(),
            message: ctx.str_param("message").unwrap_or_default().to_string(),
            kind,
            duration_ms: ctx
                .param("duration")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_DURATION_MS),
        };
        match &ctx.extra.notification_handler {
            Some(handler) => handler.notify(&notification),
            None => log::info!(
                "[{:?}] {}: {} (no notification handler attached)",
                notification.kind,
                notification.title,
                notification.message
            ),
        }
        serde_json::to_value(&notification).map_err(|e| InteractionError::Execution {
            action: self.action_type().into(),
            message: e.to_string(),
        })
    }
}
