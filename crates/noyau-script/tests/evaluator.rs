//! Integration tests: the evaluator shapes used by the data and
//! interaction engines.

use noyau_core::{ErrorCategory, JsonMap};
use noyau_script::{ScriptEngine, ScriptError};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn scope(node: Value, event: Value, extra: Value) -> JsonMap {
    let mut map = JsonMap::new();
    map.insert("node".into(), node);
    map.insert("event".into(), event);
    map.insert("extra".into(), extra);
    map
}

// ─── Conditions ─────────────────────────────────────────────────────────

#[test]
fn literal_false_condition() {
    let engine = ScriptEngine::default();
    let script = engine.compile_expression("false", &["node", "event", "extra"]).unwrap();
    assert!(!script.call_truthy(&scope(json!({}), Value::Null, json!({}))).unwrap());
}

#[test]
fn condition_over_node_event_and_extra() {
    let engine = ScriptEngine::default();
    let script = engine
        .compile_expression(
            "node.data.level >= extra.threshold and event.button == 'left'",
            &["node", "event", "extra"],
        )
        .unwrap();
    let hit = scope(
        json!({ "data": { "level": 7 } }),
        json!({ "button": "left" }),
        json!({ "threshold": 5 }),
    );
    assert!(script.call_truthy(&hit).unwrap());

    let miss = scope(json!({ "data": { "level": 7 } }), Value::Null, json!({ "threshold": 5 }));
    // Indexing a nil event raises.
    assert!(script.call_truthy(&miss).is_err());
}

// ─── Filters & transforms ───────────────────────────────────────────────

#[test]
fn message_filter() {
    let engine = ScriptEngine::default();
    let filter = engine.compile_expression("message.topic == 'temp'", &["message"]).unwrap();
    let mut bindings = JsonMap::new();
    bindings.insert("message".into(), json!({ "topic": "temp", "v": 1 }));
    assert!(filter.call_truthy(&bindings).unwrap());
    bindings.insert("message".into(), json!({ "topic": "humidity" }));
    assert!(!filter.call_truthy(&bindings).unwrap());
}

#[test]
fn transform_builds_series() {
    let engine = ScriptEngine::default();
    let transform = engine
        .compile_function(
            "local out = {} for i, v in ipairs(data) do out[i] = v * 10 end return out",
            &["data"],
        )
        .unwrap();
    let mut bindings = JsonMap::new();
    bindings.insert("data".into(), json!([1, 2, 3]));
    assert_eq!(transform.call(&bindings).unwrap(), json!([10, 20, 30]));
}

// ─── Errors ─────────────────────────────────────────────────────────────

#[test]
fn error_categories() {
    let engine = ScriptEngine::default();
    let syntax = engine.compile_expression("node.", &["node"]).unwrap_err();
    assert_eq!(syntax.category(), ErrorCategory::Validation);

    let runtime = engine
        .compile_expression("node.missing.deeper", &["node"])
        .unwrap()
        .call(&JsonMap::new())
        .unwrap_err();
    assert!(matches!(runtime, ScriptError::Runtime(_)));
    assert_eq!(runtime.category(), ErrorCategory::Runtime);
}

#[test]
fn compiled_scripts_are_independent() {
    let engine = ScriptEngine::default();
    let writer = engine.compile_function("leaked = 1 return leaked", &[]).unwrap();
    let reader = engine.compile_expression("leaked", &[]).unwrap();
    assert_eq!(writer.call(&JsonMap::new()).unwrap(), json!(1));
    assert_eq!(reader.call(&JsonMap::new()).unwrap(), Value::Null);
}
