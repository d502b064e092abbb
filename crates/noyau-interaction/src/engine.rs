//! The interaction engine: matches node interactions to an event, gates
//! them, checks response conditions and runs the registered handlers.

use crate::context::{ExtraContext, InteractionContext};
use crate::error::InteractionError;
use crate::expressions::{CONDITION_SCOPE, Expressions};
use crate::gate::Gate;
use crate::handler::{ActionHandler, ActionMetadata, resolve_params};
use crate::handlers;
use crate::host::InteractionHost;
use futures::FutureExt;
use noyau_core::{CanvasNode, InteractionDefinition, InteractionResponse, JsonMap, NodeId};
use noyau_script::ScriptEngine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Buffered results per `on()` subscriber before lagging.
    pub result_capacity: usize,
    /// Rounds of chained triggers replayed by one `drain_chained` call.
    pub max_chain_depth: usize,
    /// Compiled expressions kept before the least recently used is dropped.
    pub expression_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            result_capacity: 64,
            max_chain_depth: 16,
            expression_cache_capacity: 256,
        }
    }
}

/// Aggregate outcome of one [`InteractionEngine::trigger`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionExecutionResult {
    pub node_id: NodeId,
    pub event_type: String,
    /// No response failed.
    pub success: bool,
    /// Handlers that were invoked, successful or not.
    pub action_count: usize,
    pub errors: Vec<InteractionError>,
    /// Return values of the successful handlers, in execution order.
    pub outputs: Vec<Value>,
    pub duration: Duration,
}

pub struct InteractionEngine {
    host: Arc<dyn InteractionHost>,
    handlers: RwLock<HashMap<String, Arc<dyn ActionHandler>>>,
    expressions: Arc<Expressions>,
    gate: Gate,
    results: broadcast::Sender<InteractionExecutionResult>,
    config: EngineConfig,
}

impl InteractionEngine {
    /// An engine with the built-in handlers registered.
    pub fn new(host: Arc<dyn InteractionHost>, config: EngineConfig) -> Self {
        Self::with_scripts(host, config, ScriptEngine::default())
    }

    pub fn with_scripts(host: Arc<dyn InteractionHost>, config: EngineConfig, scripts: ScriptEngine) -> Self {
        let (results, _) = broadcast::channel(config.result_capacity.max(1));
        let engine = Self {
            host,
            handlers: RwLock::new(HashMap::new()),
            expressions: Arc::new(Expressions::with_capacity(scripts, config.expression_cache_capacity)),
            gate: Gate::default(),
            results,
            config,
        };
        for handler in handlers::builtin() {
            engine.register_action(handler);
        }
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn InteractionHost> {
        &self.host
    }

    // ─── Registry ────────────────────────────────────────────────────────

    /// Register a handler under its action type, replacing any previous one.
    pub fn register_action(&self, handler: Arc<dyn ActionHandler>) {
        let action_type = handler.action_type().to_string();
        if self.handlers.write().insert(action_type.clone(), handler).is_some() {
            log::info!("replaced action handler `{action_type}`");
        } else {
            log::debug!("registered action handler `{action_type}`");
        }
    }

    pub fn unregister_action(&self, action_type: &str) -> bool {
        self.handlers.write().remove(action_type).is_some()
    }

    fn handler(&self, action_type: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.read().get(action_type).cloned()
    }

    /// Metadata for every registered handler, sorted by action type.
    pub fn get_available_actions(&self) -> Vec<ActionMetadata> {
        let mut actions: Vec<ActionMetadata> = self.handlers.read().values().map(|h| h.metadata()).collect();
        actions.sort_by(|a, b| a.action_type.cmp(&b.action_type));
        actions
    }

    pub fn get_action_metadata(&self, action_type: &str) -> Option<ActionMetadata> {
        self.handler(action_type).map(|h| h.metadata())
    }

    /// Every structural problem in `definition`; empty when valid.
    pub fn validate_interaction(&self, definition: &InteractionDefinition) -> Vec<InteractionError> {
        let mut problems = Vec::new();
        if definition.name.trim().is_empty() {
            problems.push(InteractionError::InvalidDefinition("name is required".into()));
        }
        if definition.event.trim().is_empty() {
            problems.push(InteractionError::InvalidDefinition("event is required".into()));
        }
        if definition.responses.is_empty() {
            problems.push(InteractionError::InvalidDefinition(
                "at least one response is required".into(),
            ));
        }
        for response in &definition.responses {
            match self.handler(&response.action) {
                Some(handler) => {
                    let params = resolve_params(&handler.metadata(), response);
                    if let Err(e) = handler.validate_params(&params) {
                        problems.push(e);
                    }
                }
                None => problems.push(InteractionError::UnknownAction {
                    action: response.action.clone(),
                }),
            }
            if let Some(condition) = non_empty(&response.condition)
                && let Err(e) = self.expressions.check(condition, &CONDITION_SCOPE)
            {
                problems.push(e.into());
            }
        }
        problems
    }

    // ─── Execution ───────────────────────────────────────────────────────

    /// Subscribe to one result per `trigger` call.
    pub fn on(&self) -> broadcast::Receiver<InteractionExecutionResult> {
        self.results.subscribe()
    }

    /// Run every enabled interaction of `node` listening for `event_type`.
    pub async fn trigger(
        &self,
        node: &CanvasNode,
        event_type: &str,
        event: Value,
        extra: &ExtraContext,
    ) -> InteractionExecutionResult {
        let started = Instant::now();
        let mut run = Run::default();

        let matching = node
            .interactions
            .iter()
            .filter(|i| i.enabled && i.event == event_type)
            .filter(|i| watches(i, &event));
        for interaction in matching {
            let key = format!("{}-{}", node.id, interaction.id);
            if let Some(window) = interaction.throttle.filter(|ms| *ms > 0)
                && !self.gate.throttle(&key, Duration::from_millis(window))
            {
                log::debug!("{key}: throttled");
                continue;
            }
            if let Some(window) = interaction.debounce.filter(|ms| *ms > 0)
                && !self.gate.debounce(&key, Duration::from_millis(window)).await
            {
                log::debug!("{key}: superseded by a later trigger");
                continue;
            }
            for response in interaction.responses.iter().filter(|r| r.enabled) {
                self.respond(node, interaction, response, &event, extra, &mut run).await;
            }
        }

        let result = InteractionExecutionResult {
            node_id: node.id,
            event_type: event_type.to_string(),
            success: run.errors.is_empty(),
            action_count: run.action_count,
            errors: run.errors,
            outputs: run.outputs,
            duration: started.elapsed(),
        };
        log::debug!(
            "{} `{event_type}`: {} action(s), {} error(s) in {:?}",
            node.id,
            result.action_count,
            result.errors.len(),
            result.duration
        );
        let _ = self.results.send(result.clone());
        result
    }

    /// Look the node up through the host, then [`trigger`](Self::trigger).
    pub async fn trigger_by_id(
        &self,
        node_id: NodeId,
        event_type: &str,
        event: Value,
        extra: &ExtraContext,
    ) -> Option<InteractionExecutionResult> {
        let Some(node) = self.host.get_node(node_id) else {
            log::warn!("trigger `{event_type}` on unknown node {node_id}");
            return None;
        };
        Some(self.trigger(&node, event_type, event, extra).await)
    }

    /// Replay triggers handlers requested through the host, including the
    /// ones those replays request in turn, up to `max_chain_depth` rounds.
    pub async fn drain_chained(&self, extra: &ExtraContext) -> Vec<InteractionExecutionResult> {
        let mut results = Vec::new();
        for _ in 0..self.config.max_chain_depth {
            let pending = self.host.take_chained();
            if pending.is_empty() {
                return results;
            }
            for chained in pending {
                if let Some(result) = self.trigger_by_id(chained.node_id, &chained.event, Value::Null, extra).await {
                    results.push(result);
                }
            }
        }
        let dropped = self.host.take_chained();
        if !dropped.is_empty() {
            log::warn!(
                "dropped {} chained trigger(s) past depth {}",
                dropped.len(),
                self.config.max_chain_depth
            );
        }
        results
    }

    async fn respond(
        &self,
        node: &CanvasNode,
        interaction: &InteractionDefinition,
        response: &InteractionResponse,
        event: &Value,
        extra: &ExtraContext,
        run: &mut Run,
    ) {
        if let Some(condition) = non_empty(&response.condition) {
            let mut scope = JsonMap::new();
            scope.insert("node".into(), serde_json::to_value(node).unwrap_or_default());
            scope.insert("event".into(), event.clone());
            scope.insert("extra".into(), Value::Object(extra.values.clone()));
            if !self.expressions.condition_holds(condition, &scope) {
                log::debug!("{}: condition `{condition}` not met", response.action);
                return;
            }
        }

        if response.delay > 0 {
            tokio::time::sleep(Duration::from_millis(response.delay)).await;
        }

        let Some(handler) = self.handler(&response.action) else {
            log::warn!("no handler for action `{}`", response.action);
            run.errors.push(InteractionError::UnknownAction {
                action: response.action.clone(),
            });
            return;
        };
        let params = resolve_params(&handler.metadata(), response);
        if let Err(e) = handler.validate_params(&params) {
            log::warn!("{e}");
            run.errors.push(e);
            return;
        }

        let ctx = InteractionContext {
            source_node: node.clone(),
            interaction_id: interaction.id.clone(),
            response: response.clone(),
            params,
            event: event.clone(),
            extra: extra.clone(),
            host: self.host.clone(),
            expressions: self.expressions.clone(),
        };
        run.action_count += 1;
        match AssertUnwindSafe(handler.execute(&ctx)).catch_unwind().await {
            Ok(Ok(output)) => run.outputs.push(output),
            Ok(Err(e)) => {
                log::warn!("{e}");
                run.errors.push(e);
            }
            Err(_) => {
                log::error!("action `{}` panicked", response.action);
                run.errors.push(InteractionError::Execution {
                    action: response.action.clone(),
                    message: "handler panicked".into(),
                });
            }
        }
    }
}

impl fmt::Debug for InteractionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionEngine")
            .field("handlers", &self.handlers.read().len())
            .field("config", &self.config)
            .finish()
    }
}

#[derive(Default)]
struct Run {
    action_count: usize,
    errors: Vec<InteractionError>,
    outputs: Vec<Value>,
}

fn non_empty(condition: &Option<String>) -> Option<&str> {
    condition.as_deref().map(str::trim).filter(|c| !c.is_empty())
}

/// Interactions with a `watchedProperty` only fire for events naming that
/// property (or naming none).
fn watches(interaction: &InteractionDefinition, event: &Value) -> bool {
    match (&interaction.watched_property, event.get("property").and_then(Value::as_str)) {
        (Some(watched), Some(changed)) => watched == changed,
        _ => true,
    }
}
