//! The accessor seam between the engine and whatever owns the nodes.

use noyau_core::{CanvasHandle, CanvasNode, NodeId, NodePatch};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A trigger requested by a handler, replayed by
/// [`InteractionEngine::drain_chained`](crate::InteractionEngine::drain_chained).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedTrigger {
    pub node_id: NodeId,
    pub event: String,
}

/// What the engine needs from its host. Backed by the canvas store in
/// practice; tests substitute their own.
pub trait InteractionHost: Send + Sync {
    fn get_node(&self, id: NodeId) -> Option<CanvasNode>;

    fn update_node(&self, id: NodeId, patch: NodePatch);

    /// Ask for `event` to be fired on node `id`.
    fn trigger_interaction(&self, id: NodeId, event: &str);

    /// Hand over queued triggers. Hosts that fire them directly return none.
    fn take_chained(&self) -> Vec<ChainedTrigger> {
        Vec::new()
    }
}

/// [`InteractionHost`] over a [`CanvasHandle`]. Chained triggers are queued
/// rather than fired re-entrantly.
#[derive(Debug, Default)]
pub struct CanvasHost {
    canvas: CanvasHandle,
    chained: Mutex<VecDeque<ChainedTrigger>>,
}

impl CanvasHost {
    pub fn new(canvas: CanvasHandle) -> Self {
        Self {
            canvas,
            chained: Mutex::new(VecDeque::new()),
        }
    }

    pub fn canvas(&self) -> &CanvasHandle {
        &self.canvas
    }
}

impl InteractionHost for CanvasHost {
    fn get_node(&self, id: NodeId) -> Option<CanvasNode> {
        self.canvas.get_node(id)
    }

    fn update_node(&self, id: NodeId, patch: NodePatch) {
        self.canvas.update_node(id, patch);
    }

    fn trigger_interaction(&self, id: NodeId, event: &str) {
        self.chained.lock().push_back(ChainedTrigger {
            node_id: id,
            event: event.to_string(),
        });
    }

    fn take_chained(&self) -> Vec<ChainedTrigger> {
        self.chained.lock().drain(..).collect()
    }
}
