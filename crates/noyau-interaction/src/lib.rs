//! Noyau interaction engine.
//!
//! Nodes carry [`InteractionDefinition`](noyau_core::InteractionDefinition)s:
//! an event name plus a list of responses, each naming an action, optional
//! params, a condition and a delay. [`InteractionEngine::trigger`] runs the
//! matching ones through registered [`ActionHandler`]s and reports one
//! [`InteractionExecutionResult`] per call.
//!
//! ```rust,ignore
//! let host = Arc::new(CanvasHost::new(canvas.clone()));
//! let engine = InteractionEngine::new(host, EngineConfig::default());
//! let result = engine.trigger(&button, "click", Value::Null, &ExtraContext::default()).await;
//! assert!(result.success);
//! ```

mod context;
mod engine;
mod error;
mod expressions;
mod gate;
mod handler;
pub mod handlers;
mod host;

pub use context::{ExtraContext, InteractionContext, Navigator, Notification, NotificationHandler, NotificationKind};
pub use engine::{EngineConfig, InteractionEngine, InteractionExecutionResult};
pub use error::InteractionError;
pub use expressions::{CONDITION_SCOPE, Expressions};
pub use handler::{
    ActionCategory, ActionHandler, ActionMetadata, ParamKind, ParamSchema, resolve_params, validate_against,
};
pub use host::{CanvasHost, ChainedTrigger, InteractionHost};
