//! Integration tests: trigger matching, gating, conditions, isolation and
//! introspection.

mod common;

use async_trait::async_trait;
use common::*;
use noyau_core::{InteractionDefinition, InteractionResponse, NodeId};
use noyau_interaction::*;
use noyau_script::{ScriptConfig, ScriptEngine};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn click(id: &str) -> InteractionDefinition {
    InteractionDefinition::new(id, "On click", "click")
}

fn no_extra() -> ExtraContext {
    ExtraContext::default()
}

// ─── Conditions ─────────────────────────────────────────────────────────

#[tokio::test]
async fn false_condition_never_invokes_the_handler() {
    let interaction = click("cond_false").with_response(InteractionResponse::new("record").with_condition("false"));
    let (canvas, engine) = setup(vec![options("cond_false_btn").with_interaction(interaction)]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());

    for _ in 0..3 {
        let result = engine
            .trigger(&node(&canvas, "cond_false_btn"), "click", Value::Null, &no_extra())
            .await;
        assert!(result.success);
        assert_eq!(result.action_count, 0);
    }
    assert_eq!(recorder.hits(), 0);
}

#[tokio::test]
async fn missing_condition_always_invokes() {
    let interaction = click("cond_none").with_response(InteractionResponse::new("record"));
    let (canvas, engine) = setup(vec![options("cond_none_btn").with_interaction(interaction)]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());

    for _ in 0..3 {
        engine
            .trigger(&node(&canvas, "cond_none_btn"), "click", Value::Null, &no_extra())
            .await;
    }
    assert_eq!(recorder.hits(), 3);
}

#[tokio::test]
async fn conditions_see_node_event_and_extra() {
    let interaction = click("cond_scope")
        .with_response(InteractionResponse::new("record").with_condition("node.data.level > 5"))
        .with_response(InteractionResponse::new("record").with_condition("event.button == 'left'"))
        .with_response(InteractionResponse::new("record").with_condition("extra.role == 'admin'"))
        .with_response(InteractionResponse::new("record").with_condition("node.data.nope.deeper"));
    let (canvas, engine) = setup(vec![
        options("cond_scope_btn")
            .with_data("level", json!(7))
            .with_interaction(interaction),
    ]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());

    let extra = ExtraContext::default().with_value("role", json!("viewer"));
    let result = engine
        .trigger(&node(&canvas, "cond_scope_btn"), "click", json!({ "button": "left" }), &extra)
        .await;
    // The erroring condition is treated as false, not as a failure.
    assert!(result.success);
    assert_eq!(result.action_count, 2);
    assert_eq!(recorder.hits(), 2);
}

#[tokio::test]
async fn looping_condition_is_cut_off_and_fails_closed() {
    let interaction = click("cond_loop")
        .with_response(InteractionResponse::new("record").with_condition("(function() while true do end end)()"))
        .with_response(InteractionResponse::new("record"));
    let (canvas, _) = setup(vec![options("cond_loop_btn").with_interaction(interaction)]);
    let scripts = ScriptEngine::new(ScriptConfig {
        time_limit_ms: 50,
        ..ScriptConfig::default()
    });
    let host = Arc::new(CanvasHost::new(canvas.clone()));
    let engine = InteractionEngine::with_scripts(host, EngineConfig::default(), scripts);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine.trigger(&node(&canvas, "cond_loop_btn"), "click", Value::Null, &no_extra()),
    )
    .await
    .expect("a looping condition must not hang the trigger");
    assert!(result.success);
    assert_eq!(result.action_count, 1);
    assert_eq!(recorder.hits(), 1);
}

// ─── Matching ───────────────────────────────────────────────────────────

#[tokio::test]
async fn only_enabled_interactions_for_the_event_run() {
    let mut disabled = click("match_disabled").with_response(InteractionResponse::new("record"));
    disabled.enabled = false;
    let hover = InteractionDefinition::new("match_hover", "On hover", "hover").with_response(InteractionResponse::new("record"));
    let mut off = InteractionResponse::new("record");
    off.enabled = false;
    let partly = click("match_partly")
        .with_response(off)
        .with_response(InteractionResponse::new("record"));
    let (canvas, engine) = setup(vec![
        options("match_btn")
            .with_interaction(disabled)
            .with_interaction(hover)
            .with_interaction(partly),
    ]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());

    let result = engine.trigger(&node(&canvas, "match_btn"), "click", Value::Null, &no_extra()).await;
    assert_eq!(result.action_count, 1);
    assert_eq!(result.event_type, "click");
    assert_eq!(result.node_id, NodeId::intern("match_btn"));
}

#[tokio::test]
async fn watched_property_filters_change_events() {
    let mut watcher = InteractionDefinition::new("watch", "On value", "dataChange").with_response(InteractionResponse::new("record"));
    watcher.watched_property = Some("value".into());
    let (canvas, engine) = setup(vec![options("watch_gauge").with_interaction(watcher)]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());
    let gauge = node(&canvas, "watch_gauge");

    engine.trigger(&gauge, "dataChange", json!({ "property": "label" }), &no_extra()).await;
    assert_eq!(recorder.hits(), 0);
    engine.trigger(&gauge, "dataChange", json!({ "property": "value" }), &no_extra()).await;
    assert_eq!(recorder.hits(), 1);
}

// ─── Gating ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn throttle_allows_one_run_per_window() {
    let mut interaction = click("throttled").with_response(InteractionResponse::new("record"));
    interaction.throttle = Some(1_000);
    let (canvas, engine) = setup(vec![options("throttle_btn").with_interaction(interaction)]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());
    let btn = node(&canvas, "throttle_btn");

    for _ in 0..5 {
        engine.trigger(&btn, "click", Value::Null, &no_extra()).await;
    }
    assert_eq!(recorder.hits(), 1);

    tokio::time::advance(Duration::from_millis(1_001)).await;
    engine.trigger(&btn, "click", Value::Null, &no_extra()).await;
    assert_eq!(recorder.hits(), 2);
}

#[tokio::test(start_paused = true)]
async fn debounce_coalesces_a_burst() {
    let mut interaction = click("debounced").with_response(InteractionResponse::new("record"));
    interaction.debounce = Some(200);
    let (canvas, engine) = setup(vec![options("debounce_btn").with_interaction(interaction)]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());
    let btn = node(&canvas, "debounce_btn");

    let early = tokio::spawn({
        let engine = engine.clone();
        let btn = btn.clone();
        async move { engine.trigger(&btn, "click", Value::Null, &ExtraContext::default()).await }
    });
    tokio::task::yield_now().await;
    tokio::time::advance(Duration::from_millis(50)).await;
    let late = engine.trigger(&btn, "click", Value::Null, &no_extra()).await;
    let early = early.await.unwrap();

    assert!(early.success);
    assert_eq!(early.action_count, 0);
    assert_eq!(late.action_count, 1);
    assert_eq!(recorder.hits(), 1);
}

// ─── Execution ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn delay_postpones_the_handler() {
    let interaction = click("delayed").with_response(InteractionResponse::new("record").with_delay(500));
    let (canvas, engine) = setup(vec![options("delay_btn").with_interaction(interaction)]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());

    let result = engine.trigger(&node(&canvas, "delay_btn"), "click", Value::Null, &no_extra()).await;
    assert_eq!(recorder.hits(), 1);
    assert!(result.duration >= Duration::from_millis(500));
}

struct Panics;

#[async_trait]
impl ActionHandler for Panics {
    fn action_type(&self) -> &str {
        "panics"
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            action_type: "panics".into(),
            name: "Panics".into(),
            description: String::new(),
            category: ActionCategory::Custom,
            icon: None,
            requires_target: false,
            params: Vec::new(),
        }
    }

    async fn execute(&self, _ctx: &InteractionContext) -> Result<Value, InteractionError> {
        panic!("handler bug");
    }
}

#[tokio::test]
async fn failures_are_isolated_per_response() {
    let first = click("iso_first")
        .with_response(InteractionResponse::new("record").with_param("fail", json!(true)))
        .with_response(InteractionResponse::new("doesNotExist"))
        .with_response(InteractionResponse::new("panics"))
        .with_response(InteractionResponse::new("record"));
    let second = click("iso_second").with_response(InteractionResponse::new("record"));
    let (canvas, engine) = setup(vec![
        options("iso_btn").with_interaction(first).with_interaction(second),
    ]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());
    engine.register_action(Arc::new(Panics));

    let result = engine.trigger(&node(&canvas, "iso_btn"), "click", Value::Null, &no_extra()).await;
    assert!(!result.success);
    assert_eq!(recorder.hits(), 3);
    // record ×3 and the panicking handler were invoked; the unknown action was not.
    assert_eq!(result.action_count, 4);
    assert_eq!(result.errors.len(), 3);
    assert!(matches!(result.errors[0], InteractionError::Execution { .. }));
    assert_eq!(
        result.errors[1],
        InteractionError::UnknownAction {
            action: "doesNotExist".into()
        }
    );
    assert_eq!(result.outputs, vec![json!(2), json!(3)]);
}

#[tokio::test]
async fn results_are_broadcast() {
    let interaction = click("broadcast").with_response(InteractionResponse::new("record"));
    let (canvas, engine) = setup(vec![options("broadcast_btn").with_interaction(interaction)]);
    engine.register_action(Arc::new(Recorder::default()));
    let mut results = engine.on();

    let btn = node(&canvas, "broadcast_btn");
    engine.trigger(&btn, "click", Value::Null, &no_extra()).await;
    engine.trigger(&btn, "hover", Value::Null, &no_extra()).await;

    let first = results.recv().await.unwrap();
    assert_eq!((first.event_type.as_str(), first.action_count), ("click", 1));
    let second = results.recv().await.unwrap();
    assert_eq!((second.event_type.as_str(), second.action_count), ("hover", 0));
}

struct Chains;

#[async_trait]
impl ActionHandler for Chains {
    fn action_type(&self) -> &str {
        "chain"
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            action_type: "chain".into(),
            name: "Chain".into(),
            description: String::new(),
            category: ActionCategory::Custom,
            icon: None,
            requires_target: true,
            params: vec![ParamSchema::new("targetNodeId", "Target", ParamKind::String).required()],
        }
    }

    async fn execute(&self, ctx: &InteractionContext) -> Result<Value, InteractionError> {
        let target = ctx.str_param("targetNodeId").map(NodeId::intern);
        if let Some(target) = target {
            ctx.trigger_interaction(target, "activate");
        }
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn chained_triggers_replay_until_quiet() {
    let source = click("chain_src").with_response(InteractionResponse::new("chain").with_target(NodeId::intern("chain_b")));
    let relay = InteractionDefinition::new("chain_relay", "Relay", "activate")
        .with_response(InteractionResponse::new("record"))
        .with_response(InteractionResponse::new("chain").with_target(NodeId::intern("chain_b")));
    let (canvas, engine) = setup(vec![
        options("chain_a").with_interaction(source),
        options("chain_b").with_interaction(relay),
    ]);
    let recorder = Arc::new(Recorder::default());
    engine.register_action(recorder.clone());
    engine.register_action(Arc::new(Chains));

    engine.trigger(&node(&canvas, "chain_a"), "click", Value::Null, &no_extra()).await;
    assert_eq!(recorder.hits(), 0);

    // chain_b re-triggers itself forever; the depth bound stops it.
    let replayed = engine.drain_chained(&no_extra()).await;
    assert_eq!(replayed.len(), engine.config().max_chain_depth);
    assert_eq!(recorder.hits(), engine.config().max_chain_depth);
    assert!(engine.drain_chained(&no_extra()).await.is_empty());
}

// ─── Introspection & validation ─────────────────────────────────────────

#[tokio::test]
async fn builtins_are_listed_sorted() {
    let (_canvas, engine) = setup(vec![]);
    let kinds: Vec<String> = engine.get_available_actions().into_iter().map(|m| m.action_type).collect();
    assert_eq!(
        kinds,
        vec!["changeVisibility", "navigateToUrl", "showNotification", "updateComponentData"]
    );

    let meta = engine.get_action_metadata("navigateToUrl").unwrap();
    assert_eq!(meta.category, ActionCategory::Navigation);
    assert!(!meta.requires_target);
    assert_eq!(meta.param("target").unwrap().default_value, Some(json!("_self")));
    assert!(engine.get_action_metadata("record").is_none());

    engine.register_action(Arc::new(Recorder::default()));
    assert_eq!(engine.get_available_actions().len(), 5);
    assert!(engine.unregister_action("record"));
}

#[tokio::test]
async fn validate_reports_every_problem() {
    let (_canvas, engine) = setup(vec![]);
    let mut broken = InteractionDefinition::new("v1", "", "");
    assert_eq!(engine.validate_interaction(&broken).len(), 3);

    broken.name = "Broken".into();
    broken.event = "click".into();
    broken.responses = vec![
        InteractionResponse::new("navigateToUrl"),
        InteractionResponse::new("navigateToUrl")
            .with_param("url", json!("https://example.com"))
            .with_param("target", json!("_nowhere")),
        InteractionResponse::new("teleport"),
        InteractionResponse::new("showNotification")
            .with_param("title", json!("Hi"))
            .with_condition("node.data.x >"),
    ];
    let problems = engine.validate_interaction(&broken);
    assert_eq!(problems.len(), 4);
    assert!(matches!(problems[0], InteractionError::MissingParam { ref param, .. } if param == "url"));
    assert!(matches!(problems[1], InteractionError::InvalidParam { ref param, .. } if param == "target"));
    assert!(matches!(problems[2], InteractionError::UnknownAction { .. }));
    assert!(matches!(problems[3], InteractionError::Expression(_)));

    let valid = click("v2").with_response(
        InteractionResponse::new("changeVisibility")
            .with_target(NodeId::intern("anything"))
            .with_param("visible", json!(false))
            .with_condition("event ~= nil"),
    );
    assert!(engine.validate_interaction(&valid).is_empty());
}
