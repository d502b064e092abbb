//! Integration tests: the application root wiring the canvas, the data
//! executor and the interaction engine together.

use noyau::core::{ErrorCategory, InteractionDefinition, InteractionResponse, NodeId, NodeOptions, Point};
use noyau::data::DataSourceConfig;
use noyau::interaction::ExtraContext;
use noyau::{Noyau, NoyauConfig, NoyauError};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::time::Duration;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn add(noyau: &Noyau, opts: NodeOptions) -> NodeId {
    noyau.canvas().write(|store| store.add_node(opts)).unwrap()
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ─── Data into canvas ───────────────────────────────────────────────────

#[tokio::test]
async fn bound_values_land_on_the_canvas() {
    init_logger();
    let noyau = Noyau::default();
    let gauge = add(&noyau, NodeOptions::new("gauge", Point::default()).with_id(NodeId::intern("wire_gauge")));

    noyau
        .data()
        .bind_data_source(gauge, "value", DataSourceConfig::constant(json!(73)))
        .await
        .unwrap();

    let node = noyau.canvas().get_node(gauge).unwrap();
    assert_eq!(node.data.get("value"), Some(&json!(73)));
    // Live data is not an undoable edit; only the add is on the stack.
    assert_eq!(noyau.canvas().read(|s| s.history().undo_len()), 1);
}

// ─── Data changes fire interactions ─────────────────────────────────────

#[tokio::test]
async fn data_changes_trigger_watching_interactions() {
    init_logger();
    let noyau = Noyau::default();
    let label = add(&noyau, NodeOptions::new("text", Point::default()).with_id(NodeId::intern("wire_label")));
    let mut on_change = InteractionDefinition::new("mirror", "Mirror value", "dataChange").with_response(
        InteractionResponse::new("updateComponentData")
            .with_target(label)
            .with_param("dataKey", json!("doubled"))
            .with_param("valueExpression", json!("event.value * 2")),
    );
    on_change.watched_property = Some("value".into());
    let source = add(
        &noyau,
        NodeOptions::new("gauge", Point::new(300.0, 0.0))
            .with_id(NodeId::intern("wire_source"))
            .with_interaction(on_change),
    );

    let mut results = noyau.interactions().on();
    noyau.start();
    noyau.start();
    noyau
        .data()
        .bind_data_source(source, "value", DataSourceConfig::constant(json!(21)))
        .await
        .unwrap();
    noyau
        .data()
        .bind_data_source(source, "label", DataSourceConfig::constant(json!("ignored")))
        .await
        .unwrap();

    eventually(|| noyau.canvas().get_node(label).is_some_and(|n| n.data.get("doubled") == Some(&json!(42)))).await;

    let first = results.recv().await.unwrap();
    assert_eq!(first.node_id, source);
    assert_eq!(first.action_count, 1);
    let second = results.recv().await.unwrap();
    // The `label` change is not the watched property.
    assert_eq!(second.action_count, 0);
    noyau.shutdown();
}

// ─── Removed nodes release their sources ────────────────────────────────

#[tokio::test]
async fn removing_a_node_unbinds_its_sources() {
    init_logger();
    let noyau = Noyau::default();
    let kept = add(&noyau, NodeOptions::new("gauge", Point::default()).with_id(NodeId::intern("wire_kept")));
    let doomed = add(&noyau, NodeOptions::new("gauge", Point::default()).with_id(NodeId::intern("wire_doomed")));
    for node in [kept, doomed] {
        noyau
            .data()
            .bind_data_source(node, "v", DataSourceConfig::constant(json!(node.as_str())))
            .await
            .unwrap();
    }
    assert_eq!(noyau.data().active_instance_count(), 2);
    assert_eq!(noyau.prune_orphaned_bindings(), 0);

    noyau.start();
    noyau.canvas().write(|store| store.remove_node(doomed));
    eventually(|| noyau.data().active_instance_count() == 1).await;
    assert!(noyau.data().bound_keys(doomed).is_empty());
    assert_eq!(noyau.data().bound_keys(kept), vec!["v".to_string()]);
    noyau.shutdown();
}

#[tokio::test]
async fn prune_without_background_tasks() {
    let noyau = Noyau::default();
    let node = add(&noyau, NodeOptions::new("gauge", Point::default()));
    noyau
        .data()
        .bind_data_source(node, "v", DataSourceConfig::constant(json!(1)))
        .await
        .unwrap();
    noyau.canvas().write(|store| store.remove_node(node));
    assert_eq!(noyau.data().active_instance_count(), 1);
    assert_eq!(noyau.prune_orphaned_bindings(), 1);
    assert_eq!(noyau.data().active_instance_count(), 0);
}

// ─── Triggers & shutdown ────────────────────────────────────────────────

#[tokio::test]
async fn trigger_by_id_and_shutdown() {
    init_logger();
    let noyau = Noyau::new(NoyauConfig::from_json(r#"{ "store": { "historyDepth": 10 } }"#).unwrap());
    let panel = add(&noyau, NodeOptions::new("panel", Point::default()).with_id(NodeId::intern("wire_panel")));
    let button = add(
        &noyau,
        NodeOptions::new("button", Point::default())
            .with_id(NodeId::intern("wire_button"))
            .with_interaction(
                InteractionDefinition::new("hide", "Hide panel", "click").with_response(
                    InteractionResponse::new("changeVisibility")
                        .with_target(panel)
                        .with_param("visible", json!(false)),
                ),
            ),
    );

    let result = noyau
        .trigger(button, "click", Value::Null, &ExtraContext::default())
        .await
        .unwrap();
    assert!(result.success);
    assert!(!noyau.canvas().get_node(panel).unwrap().metadata.visible);
    assert!(
        noyau
            .trigger(NodeId::intern("wire_missing"), "click", Value::Null, &ExtraContext::default())
            .await
            .is_none()
    );

    noyau
        .data()
        .bind_data_source(panel, "n", DataSourceConfig::constant(json!(1)))
        .await
        .unwrap();
    assert_eq!(noyau.data().active_instance_count(), 1);
    noyau.shutdown();
    assert_eq!(noyau.data().active_instance_count(), 0);
}

#[tokio::test]
async fn errors_keep_their_category() {
    let noyau = Noyau::default();
    let node = add(&noyau, NodeOptions::new("gauge", Point::default()));
    let config: DataSourceConfig = serde_json::from_value(json!({
        "type": "device-api",
        "deviceId": "sensor-1",
        "metric": "temperature"
    }))
    .unwrap();

    let err: NoyauError = noyau.data().bind_data_source(node, "t", config).await.unwrap_err().into();
    assert_eq!(err.category(), ErrorCategory::Configuration);
    assert_eq!(
        NoyauConfig::from_json("{ nope").unwrap_err().category(),
        ErrorCategory::Configuration
    );
}
