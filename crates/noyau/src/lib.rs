//! Noyau: the application root.
//!
//! [`Noyau`] owns one canvas, one data-source executor writing into that
//! canvas, and one interaction engine acting on it. [`Noyau::start`] spawns
//! the background tasks: the data-change bridge, which fires `dataChange`
//! interactions whenever a bound source publishes, and the pruner, which
//! unbinds the data sources of nodes removed from the canvas.
//!
//! ```rust,ignore
//! let noyau = Noyau::new(NoyauConfig::from_json(&settings)?);
//! noyau.canvas().write(|store| store.load_json(&document))?;
//! noyau.data().bind_data_source(gauge, "value", DataSourceConfig::http(url)).await?;
//! noyau.start();
//! let result = noyau.trigger(button, "click", Value::Null, &ExtraContext::default()).await;
//! ```

mod config;
mod error;

pub use config::NoyauConfig;
pub use error::NoyauError;

pub use noyau_core as core;
pub use noyau_data as data;
pub use noyau_interaction as interaction;
pub use noyau_script as script;

use noyau_core::{CanvasHandle, CanvasStore, NodeId, StoreChange};
use noyau_data::{DataSourceExecutor, DataUpdateEvent};
use noyau_interaction::{CanvasHost, ExtraContext, InteractionEngine, InteractionExecutionResult};
use noyau_script::ScriptEngine;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Event fired on a node when one of its bound data keys changes.
pub const DATA_CHANGE_EVENT: &str = "dataChange";

pub struct Noyau {
    canvas: CanvasHandle,
    data: DataSourceExecutor,
    interactions: Arc<InteractionEngine>,
    /// Signalled whenever the node set may have shrunk.
    structure: Arc<Notify>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for Noyau {
    fn default() -> Self {
        Self::new(NoyauConfig::default())
    }
}

impl Noyau {
    pub fn new(config: NoyauConfig) -> Self {
        let scripts = ScriptEngine::new(config.script);
        let canvas = CanvasHandle::new(CanvasStore::with_config(config.store));
        let structure = Arc::new(Notify::new());
        {
            let structure = structure.clone();
            canvas.write(|store| {
                store.subscribe(move |event| {
                    if matches!(event.change, StoreChange::Nodes | StoreChange::Document) {
                        structure.notify_one();
                    }
                })
            });
        }

        let data = DataSourceExecutor::with_scripts(config.data, scripts.clone());
        data.set_sink(Some(Arc::new(canvas.clone())));

        let host = Arc::new(CanvasHost::new(canvas.clone()));
        let interactions = Arc::new(InteractionEngine::with_scripts(host, config.interactions, scripts));

        log::info!(
            "noyau ready: providers {:?}, {} action(s)",
            data.provider_kinds(),
            interactions.get_available_actions().len()
        );
        Self {
            canvas,
            data,
            interactions,
            structure,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn canvas(&self) -> &CanvasHandle {
        &self.canvas
    }

    pub fn data(&self) -> &DataSourceExecutor {
        &self.data
    }

    pub fn interactions(&self) -> &Arc<InteractionEngine> {
        &self.interactions
    }

    /// Fire `event_type` on a node, then replay any triggers its handlers
    /// chained. `None` if the node does not exist.
    pub async fn trigger(
        &self,
        node_id: NodeId,
        event_type: &str,
        event: Value,
        extra: &ExtraContext,
    ) -> Option<InteractionExecutionResult> {
        let result = self.interactions.trigger_by_id(node_id, event_type, event, extra).await;
        self.interactions.drain_chained(extra).await;
        result
    }

    /// Unbind every data source whose node is no longer on the canvas.
    /// Returns how many nodes were released.
    pub fn prune_orphaned_bindings(&self) -> usize {
        prune(&self.canvas, &self.data)
    }

    /// Spawn the data-change bridge and the pruner. Must be called inside a
    /// Tokio runtime; calling it again while they run is a no-op.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() && tasks.iter().all(|task| !task.is_finished()) {
            return;
        }
        for task in tasks.drain(..) {
            task.abort();
        }

        let mut updates = self.data.subscribe();
        let interactions = self.interactions.clone();
        tasks.push(tokio::spawn(async move {
            let extra = ExtraContext::default();
            loop {
                match updates.recv().await {
                    Ok(update) => {
                        interactions
                            .trigger_by_id(update.node_id, DATA_CHANGE_EVENT, change_event(&update), &extra)
                            .await;
                        interactions.drain_chained(&extra).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("data-change bridge lagged, {skipped} update(s) skipped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));

        let structure = self.structure.clone();
        let canvas = self.canvas.clone();
        let data = self.data.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                structure.notified().await;
                prune(&canvas, &data);
            }
        }));
        log::debug!("data-change bridge and binding pruner started");
    }

    /// Stop every data source and the background tasks.
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.data.shutdown();
    }
}

impl Drop for Noyau {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Runs outside the canvas lock: store listeners only signal.
fn prune(canvas: &CanvasHandle, data: &DataSourceExecutor) -> usize {
    let orphans: Vec<NodeId> = data
        .bound_nodes()
        .into_iter()
        .filter(|id| canvas.read(|store| store.get_node(*id).is_none()))
        .collect();
    for id in &orphans {
        log::debug!("node {id} left the canvas, unbinding its data sources");
        data.unbind_data_sources(*id);
    }
    orphans.len()
}

impl fmt::Debug for Noyau {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Noyau")
            .field("canvas", &self.canvas)
            .field("instances", &self.data.active_instance_count())
            .field("interactions", &self.interactions)
            .finish()
    }
}

/// Payload handed to `dataChange` interactions as `event`.
fn change_event(update: &DataUpdateEvent) -> Value {
    json!({
        "type": DATA_CHANGE_EVENT,
        "property": update.data_key,
        "value": update.value,
        "prevValue": update.prev_value,
        "timestamp": update.timestamp,
        "sourceType": update.source_type,
    })
}
