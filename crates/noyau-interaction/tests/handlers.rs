//! Integration tests: the built-in action handlers against a live canvas.

mod common;

use common::*;
use noyau_core::{InteractionDefinition, InteractionResponse, NodeId};
use noyau_interaction::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::sync::Arc;

fn on_click(id: &str, response: InteractionResponse) -> InteractionDefinition {
    InteractionDefinition::new(id, "On click", "click").with_response(response)
}

// ─── navigateToUrl ──────────────────────────────────────────────────────

#[tokio::test]
async fn navigate_hands_off_to_the_navigator() {
    let response = InteractionResponse::new("navigateToUrl").with_param("url", json!("https://example.com/docs"));
    let (canvas, engine) = setup(vec![options("nav_btn").with_interaction(on_click("nav", response))]);
    let navigations = Arc::new(Navigations::default());
    let extra = ExtraContext::default().with_navigator(navigations.clone());

    let result = engine.trigger(&node(&canvas, "nav_btn"), "click", Value::Null, &extra).await;
    assert!(result.success);
    assert_eq!(result.outputs, vec![json!({ "url": "https://example.com/docs", "target": "_self" })]);
    assert_eq!(
        *navigations.0.lock(),
        vec![("https://example.com/docs".to_string(), "_self".to_string())]
    );
}

#[tokio::test]
async fn navigate_without_navigator_still_succeeds() {
    let response = InteractionResponse::new("navigateToUrl")
        .with_param("url", json!("https://example.com"))
        .with_param("target", json!("_blank"));
    let (canvas, engine) = setup(vec![options("nav_soft_btn").with_interaction(on_click("nav_soft", response))]);

    let result = engine
        .trigger(&node(&canvas, "nav_soft_btn"), "click", Value::Null, &ExtraContext::default())
        .await;
    assert!(result.success);
    assert_eq!(result.outputs[0]["target"], json!("_blank"));
}

#[tokio::test]
async fn navigate_requires_a_url() {
    let (canvas, engine) = setup(vec![
        options("nav_bad_btn").with_interaction(on_click("nav_bad", InteractionResponse::new("navigateToUrl"))),
    ]);
    let result = engine
        .trigger(&node(&canvas, "nav_bad_btn"), "click", Value::Null, &ExtraContext::default())
        .await;
    assert!(!result.success);
    assert_eq!(result.action_count, 0);
    assert_eq!(
        result.errors,
        vec![InteractionError::MissingParam {
            action: "navigateToUrl".into(),
            param: "url".into()
        }]
    );
}

// ─── updateComponentData ────────────────────────────────────────────────

#[tokio::test]
async fn update_writes_a_literal_value() {
    let response = InteractionResponse::new("updateComponentData")
        .with_target(NodeId::intern("upd_target"))
        .with_param("dataKey", json!("label"))
        .with_param("value", json!("pressed"));
    let (canvas, engine) = setup(vec![
        options("upd_btn").with_interaction(on_click("upd", response)),
        options("upd_target").with_data("keep", json!(1)),
    ]);

    let result = engine
        .trigger(&node(&canvas, "upd_btn"), "click", Value::Null, &ExtraContext::default())
        .await;
    assert!(result.success);
    let target = node(&canvas, "upd_target");
    assert_eq!(target.data.get("label"), Some(&json!("pressed")));
    assert_eq!(target.data.get("keep"), Some(&json!(1)));

    // The write went through the store, so it can be undone.
    assert!(canvas.write(|store| store.undo()));
    assert_eq!(node(&canvas, "upd_target").data.get("label"), None);
}

#[tokio::test]
async fn update_evaluates_value_expressions() {
    let response = InteractionResponse::new("updateComponentData")
        .with_param("targetNodeId", json!("expr_target"))
        .with_param("dataKey", json!("total"))
        .with_param("valueExpression", json!("sourceNode.data.step + targetNode.data.total + event.bonus"));
    let (canvas, engine) = setup(vec![
        options("expr_btn")
            .with_data("step", json!(5))
            .with_interaction(on_click("expr", response)),
        options("expr_target").with_data("total", json!(10)),
    ]);
    let btn = node(&canvas, "expr_btn");

    engine.trigger(&btn, "click", json!({ "bonus": 1 }), &ExtraContext::default()).await;
    assert_eq!(node(&canvas, "expr_target").data["total"], json!(16));
    engine.trigger(&btn, "click", json!({ "bonus": 0 }), &ExtraContext::default()).await;
    assert_eq!(node(&canvas, "expr_target").data["total"], json!(21));
}

#[tokio::test]
async fn update_fails_for_a_missing_target() {
    let response = InteractionResponse::new("updateComponentData")
        .with_target(NodeId::intern("upd_ghost"))
        .with_param("dataKey", json!("x"))
        .with_param("value", json!(1));
    let (canvas, engine) = setup(vec![options("upd_ghost_btn").with_interaction(on_click("ghost", response))]);

    let result = engine
        .trigger(&node(&canvas, "upd_ghost_btn"), "click", Value::Null, &ExtraContext::default())
        .await;
    assert_eq!(result.errors, vec![InteractionError::TargetNotFound(NodeId::intern("upd_ghost"))]);
}

// ─── changeVisibility ───────────────────────────────────────────────────

#[tokio::test]
async fn visibility_toggles_and_returns_hints() {
    let response = InteractionResponse::new("changeVisibility")
        .with_target(NodeId::intern("vis_panel"))
        .with_param("visible", json!(false))
        .with_param("animation", json!("fade"));
    let (canvas, engine) = setup(vec![
        options("vis_btn").with_interaction(on_click("vis", response)),
        options("vis_panel"),
    ]);

    let result = engine
        .trigger(&node(&canvas, "vis_btn"), "click", Value::Null, &ExtraContext::default())
        .await;
    assert!(result.success);
    assert!(!node(&canvas, "vis_panel").metadata.visible);
    assert_eq!(
        result.outputs[0],
        json!({ "targetNodeId": "vis_panel", "visible": false, "animation": "fade", "duration": 300 })
    );
}

// ─── showNotification ───────────────────────────────────────────────────

#[tokio::test]
async fn notification_reaches_the_handler_with_defaults() {
    let response = InteractionResponse::new("showNotification")
        .with_param("title", json!("Saved"))
        .with_param("message", json!("All changes stored"));
    let (canvas, engine) = setup(vec![options("note_btn").with_interaction(on_click("note", response))]);
    let notifications = Arc::new(Notifications::default());
    let extra = ExtraContext::default().with_notification_handler(notifications.clone());

    engine.trigger(&node(&canvas, "note_btn"), "click", Value::Null, &extra).await;
    assert_eq!(
        *notifications.0.lock(),
        vec![Notification {
            title: "Saved".into(),
            message: "All changes stored".into(),
            kind: NotificationKind::Info,
            duration_ms: 3000,
        }]
    );
}

#[tokio::test]
async fn notification_without_handler_is_not_an_error() {
    let response = InteractionResponse::new("showNotification")
        .with_param("title", json!("Heads up"))
        .with_param("type", json!("warning"));
    let (canvas, engine) = setup(vec![options("note_soft_btn").with_interaction(on_click("note_soft", response))]);

    let result = engine
        .trigger(&node(&canvas, "note_soft_btn"), "click", Value::Null, &ExtraContext::default())
        .await;
    assert!(result.success);
    assert_eq!(result.outputs[0]["type"], json!("warning"));
}
