//! The canvas store: sole owner of nodes, viewport, selection, config,
//! history and mode.
//!
//! All mutations are synchronous and replace nodes wholesale (the previous
//! value is kept in history). Mutations on unknown ids are silent no-ops.
//! Every committed change bumps a revision counter and notifies listeners,
//! which is how renderers follow the render tree without touching it.

use crate::actions;
use crate::error::CanvasError;
use crate::history::{History, HistoryKind, HistoryRecord, NodeSnapshot, DEFAULT_HISTORY_DEPTH};
use crate::id::NodeId;
use crate::model::*;
use crate::selectors;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Store tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub history_depth: usize,
    pub clone_offset: Point,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            clone_offset: Point::new(20.0, 20.0),
            min_zoom: 0.1,
            max_zoom: 10.0,
        }
    }
}

/// What a committed change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Nodes,
    /// Live data written by a data source (not recorded in history).
    Data(NodeId),
    Selection,
    Viewport,
    Mode,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreEvent {
    pub revision: u64,
    pub change: StoreChange,
}

pub type StoreListener = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct CanvasStore {
    nodes: Vec<CanvasNode>,
    viewport: Viewport,
    selection: Selection,
    config: CanvasConfig,
    history: History,
    mode: CanvasMode,
    settings: StoreConfig,
    revision: u64,
    listeners: Vec<(ListenerId, StoreListener)>,
    next_listener: u64,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(settings: StoreConfig) -> Self {
        Self {
            nodes: Vec::new(),
            viewport: Viewport::default(),
            selection: Selection::default(),
            config: CanvasConfig::default(),
            history: History::new(settings.history_depth),
            mode: CanvasMode::default(),
            settings,
            revision: 0,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    // ─── Subscriptions ───────────────────────────────────────────────────

    /// Register a change listener. Listeners run synchronously after each
    /// committed change and must not call back into the store.
    pub fn subscribe(&mut self, listener: impl Fn(&StoreEvent) + Send + Sync + 'static) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    fn emit(&mut self, change: StoreChange) {
        self.revision += 1;
        let event = StoreEvent {
            revision: self.revision,
            change,
        };
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    // ─── Getters ─────────────────────────────────────────────────────────

    /// The ordered node list renderers consume.
    pub fn render_tree(&self) -> &[CanvasNode] {
        &self.nodes
    }

    pub fn get_node(&self, id: NodeId) -> Option<&CanvasNode> {
        selectors::find_node(&self.nodes, id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_count_by_type(&self) -> BTreeMap<String, usize> {
        selectors::node_count_by_type(&self.nodes)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_ids(&self) -> &[NodeId] {
        &self.selection.selected_ids
    }

    pub fn selected_nodes(&self) -> Vec<&CanvasNode> {
        selectors::find_nodes(&self.nodes, &self.selection.selected_ids)
    }

    pub fn hovered_node(&self) -> Option<&CanvasNode> {
        self.selection.hovered_id.and_then(|id| self.get_node(id))
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn mode(&self) -> CanvasMode {
        self.mode
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn settings(&self) -> &StoreConfig {
        &self.settings
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ─── Node lifecycle ──────────────────────────────────────────────────

    /// Add one node, select it, and record an `add` entry.
    pub fn add_node(&mut self, opts: NodeOptions) -> Result<NodeId, CanvasError> {
        self.add_nodes(vec![opts])?
            .into_iter()
            .next()
            .ok_or_else(|| CanvasError::InvalidNode("no node created".into()))
    }

    /// Add several nodes as one history entry; the new ids become the
    /// selection. All options are validated before anything is inserted.
    pub fn add_nodes(&mut self, opts: Vec<NodeOptions>) -> Result<Vec<NodeId>, CanvasError> {
        if opts.is_empty() {
            return Ok(Vec::new());
        }
        let mut taken: HashSet<NodeId> = selectors::all_ids(&self.nodes).into_iter().collect();
        for o in &opts {
            actions::validate_options(o).map_err(CanvasError::InvalidNode)?;
            if let Some(id) = o.id
                && !taken.insert(id)
            {
                return Err(CanvasError::DuplicateId(id));
            }
            for child in &o.children {
                for id in selectors::all_ids(std::slice::from_ref(child)) {
                    if !taken.insert(id) {
                        return Err(CanvasError::DuplicateId(id));
                    }
                }
            }
        }

        let now = now_ms();
        let mut snapshots = Vec::with_capacity(opts.len());
        for o in opts {
            let id = match o.id {
                Some(id) => id,
                None => fresh_id(&mut taken),
            };
            let node = actions::create_node(id, o, now);
            snapshots.push(NodeSnapshot {
                index: self.nodes.len(),
                node: node.clone(),
            });
            self.nodes.push(node);
        }

        let ids: Vec<NodeId> = snapshots.iter().map(|s| s.node.id).collect();
        log::debug!("add {} node(s): {:?}", ids.len(), ids);
        self.selection.selected_ids = ids.clone();
        self.history.push(HistoryRecord::added(snapshots));
        self.emit(StoreChange::Nodes);
        Ok(ids)
    }

    pub fn remove_node(&mut self, id: NodeId) {
        self.remove_nodes(&[id]);
    }

    /// Remove nodes, prune them from the selection, record a `remove` entry.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) {
        let removed: Vec<NodeSnapshot> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| ids.contains(&n.id))
            .map(|(index, n)| NodeSnapshot {
                index,
                node: n.clone(),
            })
            .collect();
        if removed.is_empty() {
            log::debug!("remove: no known ids in {ids:?}");
            return;
        }
        self.nodes.retain(|n| !ids.contains(&n.id));
        log::debug!("remove {} node(s)", removed.len());
        self.prune_selection();
        self.history.push(HistoryRecord::removed(removed));
        self.emit(StoreChange::Nodes);
    }

    /// Remove every selected node.
    pub fn remove_selected(&mut self) {
        let ids = self.selection.selected_ids.clone();
        self.remove_nodes(&ids);
    }

    pub fn update_node(&mut self, id: NodeId, patch: NodePatch) {
        self.update_nodes(vec![(id, patch)]);
    }

    /// Shallow-merge each patch into its node as a single `update` entry.
    pub fn update_nodes(&mut self, updates: Vec<(NodeId, NodePatch)>) {
        let now = now_ms();
        let mut edits: Vec<(usize, CanvasNode)> = Vec::new();
        for (id, patch) in updates {
            let (patch, dropped) = actions::sanitize_patch(patch);
            if dropped {
                log::warn!("update {id}: dropped non-finite geometry");
            }
            if patch.is_empty() {
                continue;
            }
            self.stage_edit(&mut edits, id, |node| Some(actions::apply_patch(node, &patch, now)));
        }
        self.commit(HistoryKind::Update, edits);
    }

    /// Move a node to an absolute position. No-op for locked nodes.
    pub fn move_node(&mut self, id: NodeId, position: Point) {
        if !position.is_finite() {
            log::warn!("move {id}: non-finite position ignored");
            return;
        }
        let now = now_ms();
        let mut edits = Vec::new();
        self.stage_edit(&mut edits, id, |node| {
            (!node.is_locked()).then(|| actions::move_node(node, position, now))
        });
        self.commit(HistoryKind::Move, edits);
    }

    /// Translate several nodes by a delta as one `move` entry. Locked nodes
    /// stay put.
    pub fn move_nodes_by(&mut self, ids: &[NodeId], dx: f64, dy: f64) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        let now = now_ms();
        let mut edits = Vec::new();
        for &id in ids {
            self.stage_edit(&mut edits, id, |node| {
                (!node.is_locked()).then(|| {
                    let p = Point::new(node.position.x + dx, node.position.y + dy);
                    actions::move_node(node, p, now)
                })
            });
        }
        self.commit(HistoryKind::Move, edits);
    }

    /// Resize a node. No-op for locked nodes.
    pub fn resize_node(&mut self, id: NodeId, size: Size) {
        if !size.is_finite() {
            log::warn!("resize {id}: non-finite size ignored");
            return;
        }
        let now = now_ms();
        let mut edits = Vec::new();
        self.stage_edit(&mut edits, id, |node| {
            (!node.is_locked()).then(|| actions::resize_node(node, size, now))
        });
        self.commit(HistoryKind::Resize, edits);
    }

    /// Duplicate a node under a new id, offset by `offset` (default 20,20).
    pub fn clone_node(&mut self, id: NodeId, offset: Option<Point>) -> Option<NodeId> {
        self.clone_many(&[id], offset).into_iter().next()
    }

    /// Clone every selected node as one `add` entry; clones become the selection.
    pub fn duplicate_selection(&mut self) -> Vec<NodeId> {
        let ids = self.selection.selected_ids.clone();
        self.clone_many(&ids, None)
    }

    fn clone_many(&mut self, ids: &[NodeId], offset: Option<Point>) -> Vec<NodeId> {
        let offset = offset.unwrap_or(self.settings.clone_offset);
        let now = now_ms();
        let mut taken: HashSet<NodeId> = selectors::all_ids(&self.nodes).into_iter().collect();
        let mut snapshots = Vec::new();
        for &id in ids {
            let Some(source) = self.get_node(id).cloned() else {
                continue;
            };
            let new_id = fresh_id(&mut taken);
            let cloned = actions::clone_node(&source, new_id, offset, now, &mut || fresh_id(&mut taken));
            snapshots.push(NodeSnapshot {
                index: self.nodes.len(),
                node: cloned.clone(),
            });
            self.nodes.push(cloned);
        }
        if snapshots.is_empty() {
            return Vec::new();
        }
        let new_ids: Vec<NodeId> = snapshots.iter().map(|s| s.node.id).collect();
        log::debug!("clone {ids:?} -> {new_ids:?}");
        self.selection.selected_ids = new_ids.clone();
        self.history.push(HistoryRecord::added(snapshots));
        self.emit(StoreChange::Nodes);
        new_ids
    }

    pub fn toggle_node_lock(&mut self, id: NodeId) {
        let now = now_ms();
        let mut edits = Vec::new();
        self.stage_edit(&mut edits, id, |node| Some(actions::toggle_lock(node, now)));
        self.commit(HistoryKind::Update, edits);
    }

    pub fn toggle_node_visibility(&mut self, id: NodeId) {
        let now = now_ms();
        let mut edits = Vec::new();
        self.stage_edit(&mut edits, id, |node| Some(actions::toggle_visibility(node, now)));
        self.commit(HistoryKind::Update, edits);
    }

    /// Set `zIndex` to one above the current maximum.
    pub fn bring_node_to_front(&mut self, id: NodeId) {
        let z = actions::front_z_index(&self.nodes);
        self.set_z_index(id, z);
    }

    /// Set `zIndex` to one below the current minimum.
    pub fn send_node_to_back(&mut self, id: NodeId) {
        let z = actions::back_z_index(&self.nodes);
        self.set_z_index(id, z);
    }

    fn set_z_index(&mut self, id: NodeId, z: i64) {
        let now = now_ms();
        let mut edits = Vec::new();
        self.stage_edit(&mut edits, id, |node| Some(actions::set_z_index(node, z, now)));
        self.commit(HistoryKind::Update, edits);
    }

    /// Write one live data value into `node.data[key]`. Used by data
    /// sources; bypasses history so polling never floods the undo stack.
    pub fn set_node_data(&mut self, id: NodeId, key: &str, value: Value) {
        let now = now_ms();
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
            log::debug!("set data {id}.{key}: unknown node");
            return;
        };
        node.data.insert(key.to_string(), value);
        node.metadata.updated_at = actions::next_timestamp(node.metadata.updated_at, now);
        log::trace!("set data {id}.{key}");
        self.emit(StoreChange::Data(id));
    }

    /// Stage a replacement for `id`. Repeated edits of one node within a
    /// batch build on the staged value, so the history entry holds the
    /// original snapshot and the final one.
    fn stage_edit(
        &self,
        edits: &mut Vec<(usize, CanvasNode)>,
        id: NodeId,
        edit: impl FnOnce(&CanvasNode) -> Option<CanvasNode>,
    ) {
        if let Some(slot) = edits.iter_mut().find(|(_, n)| n.id == id) {
            if let Some(next) = edit(&slot.1) {
                slot.1 = next;
            }
            return;
        }
        let Some(index) = selectors::find_node_index(&self.nodes, id) else {
            log::debug!("edit {id}: unknown node");
            return;
        };
        if let Some(next) = edit(&self.nodes[index]) {
            edits.push((index, next));
        }
    }

    fn commit(&mut self, kind: HistoryKind, edits: Vec<(usize, CanvasNode)>) {
        if edits.is_empty() {
            return;
        }
        let before: Vec<NodeSnapshot> = edits
            .iter()
            .map(|(index, _)| NodeSnapshot {
                index: *index,
                node: self.nodes[*index].clone(),
            })
            .collect();
        let after: Vec<NodeSnapshot> = edits
            .into_iter()
            .map(|(index, node)| NodeSnapshot { index, node })
            .collect();
        for snapshot in &after {
            self.nodes[snapshot.index] = snapshot.node.clone();
        }
        log::debug!("{kind:?} {} node(s)", after.len());
        self.history.push(HistoryRecord::changed(kind, before, after));
        self.emit(StoreChange::Nodes);
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Replace the selection. Unknown and repeated ids are dropped.
    pub fn select_nodes(&mut self, ids: &[NodeId]) {
        self.selection.selected_ids.clear();
        self.extend_selection(ids);
        self.emit(StoreChange::Selection);
    }

    pub fn add_to_selection(&mut self, ids: &[NodeId]) {
        self.extend_selection(ids);
        self.emit(StoreChange::Selection);
    }

    pub fn remove_from_selection(&mut self, ids: &[NodeId]) {
        self.selection.selected_ids.retain(|id| !ids.contains(id));
        self.emit(StoreChange::Selection);
    }

    pub fn select_all(&mut self) {
        self.selection.selected_ids = self.nodes.iter().map(|n| n.id).collect();
        self.emit(StoreChange::Selection);
    }

    pub fn clear_selection(&mut self) {
        self.selection.selected_ids.clear();
        self.emit(StoreChange::Selection);
    }

    /// Set or clear the hovered node; an unknown id clears it.
    pub fn set_hovered_node(&mut self, id: Option<NodeId>) {
        self.selection.hovered_id = id.filter(|id| selectors::contains_node(&self.nodes, *id));
        self.emit(StoreChange::Selection);
    }

    /// Select every visible node overlapping `region`.
    pub fn select_in_region(&mut self, region: Rect, mode: selectors::RegionMode) {
        let ids: Vec<NodeId> = selectors::nodes_in_region(&self.nodes, region, mode)
            .into_iter()
            .map(|n| n.id)
            .collect();
        self.select_nodes(&ids);
    }

    fn extend_selection(&mut self, ids: &[NodeId]) {
        for &id in ids {
            if selectors::contains_node(&self.nodes, id) && !self.selection.selected_ids.contains(&id) {
                self.selection.selected_ids.push(id);
            }
        }
    }

    fn prune_selection(&mut self) {
        let nodes = &self.nodes;
        self.selection
            .selected_ids
            .retain(|id| selectors::contains_node(nodes, *id));
        if let Some(hovered) = self.selection.hovered_id
            && !selectors::contains_node(nodes, hovered)
        {
            self.selection.hovered_id = None;
        }
    }

    // ─── Viewport & mode ─────────────────────────────────────────────────

    pub fn pan_viewport(&mut self, dx: f64, dy: f64) {
        self.viewport = actions::pan_viewport(self.viewport, dx, dy);
        self.emit(StoreChange::Viewport);
    }

    /// Multiply zoom by `scale` (clamped), keeping `center` fixed if given.
    pub fn zoom_viewport(&mut self, scale: f64, center: Option<Point>) {
        self.viewport = actions::zoom_viewport(
            self.viewport,
            scale,
            center,
            self.settings.min_zoom,
            self.settings.max_zoom,
        );
        self.emit(StoreChange::Viewport);
    }

    pub fn reset_viewport(&mut self) {
        self.viewport = actions::reset_viewport();
        self.emit(StoreChange::Viewport);
    }

    /// Switch mode. Entering preview clears the selection.
    pub fn set_mode(&mut self, mode: CanvasMode) {
        self.mode = mode;
        if mode == CanvasMode::Preview {
            self.selection = Selection::default();
        }
        log::debug!("mode -> {mode:?}");
        self.emit(StoreChange::Mode);
    }

    pub fn set_config(&mut self, config: CanvasConfig) {
        self.config = config;
        self.emit(StoreChange::Document);
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> bool {
        let Some(kind) = self.history.undo(&mut self.nodes) else {
            return false;
        };
        log::debug!("undo {kind:?}");
        self.prune_selection();
        self.emit(StoreChange::Nodes);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(kind) = self.history.redo(&mut self.nodes) else {
            return false;
        };
        log::debug!("redo {kind:?}");
        self.prune_selection();
        self.emit(StoreChange::Nodes);
        true
    }

    // ─── Bulk ────────────────────────────────────────────────────────────

    /// Replace nodes (and config, if given); clears selection and history.
    pub fn load_canvas(&mut self, nodes: Vec<CanvasNode>, config: Option<CanvasConfig>) -> Result<(), CanvasError> {
        validate_tree(&nodes)?;
        log::info!("load canvas: {} node(s)", nodes.len());
        self.nodes = nodes;
        if let Some(config) = config {
            self.config = config;
        }
        self.selection = Selection::default();
        self.history.clear();
        self.emit(StoreChange::Document);
        Ok(())
    }

    pub fn export_canvas(&self) -> CanvasDocument {
        CanvasDocument {
            nodes: self.nodes.clone(),
            config: self.config.clone(),
            version: DOCUMENT_VERSION.to_string(),
            export_time: now_ms(),
        }
    }

    /// Empty nodes, selection and history; reset the viewport.
    pub fn clear_canvas(&mut self) {
        self.nodes.clear();
        self.selection = Selection::default();
        self.history.clear();
        self.viewport = Viewport::default();
        log::info!("canvas cleared");
        self.emit(StoreChange::Document);
    }

    pub fn load_document(&mut self, document: CanvasDocument) -> Result<(), CanvasError> {
        self.load_canvas(document.nodes, Some(document.config))
    }

    pub fn export_json(&self) -> Result<String, CanvasError> {
        Ok(serde_json::to_string(&self.export_canvas())?)
    }

    pub fn load_json(&mut self, json: &str) -> Result<(), CanvasError> {
        let document: CanvasDocument = serde_json::from_str(json)?;
        self.load_document(document)
    }

    /// Compact MessagePack snapshot of the same document.
    pub fn export_binary(&self) -> Result<Vec<u8>, CanvasError> {
        Ok(rmp_serde::to_vec_named(&self.export_canvas())?)
    }

    pub fn load_binary(&mut self, bytes: &[u8]) -> Result<(), CanvasError> {
        let document: CanvasDocument = rmp_serde::from_slice(bytes)?;
        self.load_document(document)
    }
}

/// Draw `node_<n>` ids until one is free, and reserve it.
fn fresh_id(taken: &mut HashSet<NodeId>) -> NodeId {
    loop {
        let id = NodeId::generate();
        if taken.insert(id) {
            return id;
        }
    }
}

/// Unique ids across the whole tree and finite geometry everywhere.
fn validate_tree(nodes: &[CanvasNode]) -> Result<(), CanvasError> {
    let mut seen = HashSet::new();
    let mut problem: Option<CanvasError> = None;
    for node in nodes {
        node.walk(&mut |n| {
            if problem.is_some() {
                return;
            }
            if !seen.insert(n.id) {
                problem = Some(CanvasError::DuplicateId(n.id));
            } else if !(n.position.is_finite() && n.size.is_finite()) {
                problem = Some(CanvasError::InvalidNode(format!("{}: non-finite geometry", n.id)));
            }
        });
    }
    match problem {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
