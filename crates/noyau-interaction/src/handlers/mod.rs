//! Built-in action handlers.

mod navigate;
mod notification;
mod update_data;
mod visibility;

pub use navigate::NavigateToUrl;
pub use notification::ShowNotification;
pub use update_data::UpdateComponentData;
pub use visibility::ChangeVisibility;

use crate::context::InteractionContext;
use crate::error::InteractionError;
use crate::handler::ActionHandler;
use noyau_core::{CanvasNode, NodeId};
use std::sync::Arc;

pub(crate) fn builtin() -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(NavigateToUrl),
        Arc::new(UpdateComponentData),
        Arc::new(ChangeVisibility),
        Arc::new(ShowNotification),
    ]
}

/// The node named by the `targetNodeId` param, which must exist.
fn target_node(ctx: &InteractionContext) -> Result<CanvasNode, InteractionError> {
    let id = ctx
        .str_param("targetNodeId")
        .map(NodeId::intern)
        .ok_or_else(|| InteractionError::MissingParam {
            action: ctx.response.action.clone(),
            param: "targetNodeId".into(),
        })?;
    ctx.get_node(id).ok_or(InteractionError::TargetNotFound(id))
}
