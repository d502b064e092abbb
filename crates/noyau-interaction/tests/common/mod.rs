#![allow(dead_code)]

use async_trait::async_trait;
use noyau_core::{CanvasHandle, CanvasNode, CanvasStore, NodeId, NodeOptions, Point};
use noyau_interaction::*;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A canvas holding `nodes` and an engine wired to it.
pub fn setup(nodes: Vec<NodeOptions>) -> (CanvasHandle, Arc<InteractionEngine>) {
    init_logger();
    let mut store = CanvasStore::new();
    store.add_nodes(nodes).unwrap();
    let canvas = CanvasHandle::new(store);
    let host = Arc::new(CanvasHost::new(canvas.clone()));
    let engine = Arc::new(InteractionEngine::new(host, EngineConfig::default()));
    (canvas, engine)
}

pub fn node(canvas: &CanvasHandle, id: &str) -> CanvasNode {
    canvas.get_node(NodeId::intern(id)).unwrap()
}

pub fn options(id: &str) -> NodeOptions {
    NodeOptions::new("button", Point::new(0.0, 0.0)).with_id(NodeId::intern(id))
}

/// Counts its invocations; fails when its `fail` param is true.
#[derive(Default)]
pub struct Recorder {
    pub hits: AtomicUsize,
}

impl Recorder {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionHandler for Recorder {
    fn action_type(&self) -> &str {
        "record"
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            action_type: "record".into(),
            name: "Record".into(),
            description: "Counts invocations".into(),
            category: ActionCategory::Custom,
            icon: None,
            requires_target: false,
            params: vec![ParamSchema::new("fail", "Fail", ParamKind::Boolean).with_default(json!(false))],
        }
    }

    async fn execute(&self, ctx: &InteractionContext) -> Result<Value, InteractionError> {
        let n = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
        if ctx.param("fail").and_then(Value::as_bool) == Some(true) {
            return Err(InteractionError::Execution {
                action: "record".into(),
                message: "asked to fail".into(),
            });
        }
        Ok(json!(n))
    }
}

#[derive(Default)]
pub struct Notifications(pub Mutex<Vec<Notification>>);

impl NotificationHandler for Notifications {
    fn notify(&self, notification: &Notification) {
        self.0.lock().push(notification.clone());
    }
}

#[derive(Default)]
pub struct Navigations(pub Mutex<Vec<(String, String)>>);

impl Navigator for Navigations {
    fn navigate(&self, url: &str, target: &str) {
        self.0.lock().push((url.to_string(), target.to_string()));
    }
}
