//! Instance status, update events, and the sink that writes values back
//! into the canvas.

use noyau_core::{CanvasHandle, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DataSourceConfig;

/// `idle → loading → success | error`. Polls and refreshes re-enter
/// `loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// One value change delivered to one binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUpdateEvent {
    pub node_id: NodeId,
    pub data_key: String,
    pub value: Value,
    pub prev_value: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub source_type: String,
}

/// Read-only view of a live instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSnapshot {
    pub id: String,
    pub config: DataSourceConfig,
    pub value: Value,
    pub status: SourceStatus,
    pub error: Option<String>,
    pub last_updated: Option<i64>,
    /// Number of bindings sharing this instance.
    pub ref_count: usize,
}

/// Receives every update event, synchronously, in completion order.
pub trait DataSink: Send + Sync {
    fn apply(&self, event: &DataUpdateEvent);
}

impl DataSink for CanvasHandle {
    fn apply(&self, event: &DataUpdateEvent) {
        self.set_node_data(event.node_id, &event.data_key, event.value.clone());
    }
}
