//! Shared, cloneable access to one [`CanvasStore`].
//!
//! The application root builds a single handle and hands clones to the
//! data-source executor and the interaction engine. The lock is never held
//! across an `.await`; callers get a short critical section through
//! [`CanvasHandle::read`] / [`CanvasHandle::write`].

use crate::id::NodeId;
use crate::model::{CanvasNode, NodePatch};
use crate::store::CanvasStore;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CanvasHandle {
    inner: Arc<Mutex<CanvasStore>>,
}

impl CanvasHandle {
    pub fn new(store: CanvasStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with shared access to the store.
    pub fn read<R>(&self, f: impl FnOnce(&CanvasStore) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Run `f` with exclusive access to the store.
    pub fn write<R>(&self, f: impl FnOnce(&mut CanvasStore) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn get_node(&self, id: NodeId) -> Option<CanvasNode> {
        self.read(|store| store.get_node(id).cloned())
    }

    pub fn update_node(&self, id: NodeId, patch: NodePatch) {
        self.write(|store| store.update_node(id, patch));
    }

    pub fn set_node_data(&self, id: NodeId, key: &str, value: Value) {
        self.write(|store| store.set_node_data(id, key, value));
    }

    /// Owned copy of the render tree.
    pub fn render_tree(&self) -> Vec<CanvasNode> {
        self.read(|store| store.render_tree().to_vec())
    }

    pub fn revision(&self) -> u64 {
        self.read(CanvasStore::revision)
    }

    /// Whether both handles point at the same store.
    pub fn ptr_eq(&self, other: &CanvasHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for CanvasHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasHandle")
            .field("revision", &self.revision())
            .finish()
    }
}
