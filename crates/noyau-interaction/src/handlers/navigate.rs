use crate::context::InteractionContext;
use crate::error::InteractionError;
use crate::handler::{ActionCategory, ActionHandler, ActionMetadata, ParamKind, ParamSchema};
use async_trait::async_trait;
use serde_json::{Value, json};

pub const TARGETS: [&str; 4] = ["_self", "_blank", "_parent", "_top"];

/// Opens a URL through the caller's [`Navigator`](crate::Navigator).
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigateToUrl;

#[async_trait]
impl ActionHandler for NavigateToUrl {
    fn action_type(&self) -> &str {
        "navigateToUrl"
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            action_type: self.action_type().into(),
            name: "Navigate to URL".into(),
            description: "Open a URL in the current or a new window".into(),
            category: ActionCategory::Navigation,
            icon: Some("link".into()),
            requires_target: false,
            params: vec![
                ParamSchema::new("url", "URL", ParamKind::String).required(),
                ParamSchema::new("target", "Target", ParamKind::Select)
                    .with_options(&TARGETS)
                    .with_default(json!("_self")),
            ],
        }
    }

    async fn execute(&self, ctx: &InteractionContext) -> Result<Value, InteractionError> {
        let url = ctx.str_param("url").unwrap_or_default();
        let target = ctx.str_param("target").unwrap_or("_self");
        match &ctx.extra.navigator {
            Some(navigator) => navigator.navigate(url, target),
            None => log::info!("navigate to {url} ({target}): no navigator attached"),
        }
        Ok(json!({ "url": url, "target": target }))
    }
}
