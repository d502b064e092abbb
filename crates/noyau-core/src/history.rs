//! Undo/redo history.
//!
//! Every store mutation pushes one [`HistoryRecord`] holding node snapshots
//! from before and after the change. Undo pops the record, applies its
//! inverse to the node list and moves it to the redo stack; redo does the
//! mirror. Both stacks are bounded and drop their oldest entry when full.
//!
//! Snapshots remember the render-tree index they were taken at, so undoing
//! a removal puts nodes back exactly where they were.

use crate::model::CanvasNode;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_DEPTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Add,
    Remove,
    Update,
    Move,
    Resize,
}

/// A node captured together with its index in the render tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub index: usize,
    pub node: CanvasNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub kind: HistoryKind,
    pub before: SmallVec<[NodeSnapshot; 1]>,
    pub after: SmallVec<[NodeSnapshot; 1]>,
}

impl HistoryRecord {
    pub fn added(after: impl IntoIterator<Item = NodeSnapshot>) -> Self {
        Self {
            kind: HistoryKind::Add,
            before: SmallVec::new(),
            after: after.into_iter().collect(),
        }
    }

    pub fn removed(before: impl IntoIterator<Item = NodeSnapshot>) -> Self {
        Self {
            kind: HistoryKind::Remove,
            before: before.into_iter().collect(),
            after: SmallVec::new(),
        }
    }

    pub fn changed(
        kind: HistoryKind,
        before: impl IntoIterator<Item = NodeSnapshot>,
        after: impl IntoIterator<Item = NodeSnapshot>,
    ) -> Self {
        Self {
            kind,
            before: before.into_iter().collect(),
            after: after.into_iter().collect(),
        }
    }

    /// Revert this record on `nodes`.
    pub fn apply_backward(&self, nodes: &mut Vec<CanvasNode>) {
        match self.kind {
            HistoryKind::Add => remove_snapshots(nodes, &self.after),
            HistoryKind::Remove => insert_snapshots(nodes, &self.before),
            HistoryKind::Update | HistoryKind::Move | HistoryKind::Resize => {
                replace_snapshots(nodes, &self.before)
            }
        }
    }

    /// Re-apply this record on `nodes`.
    pub fn apply_forward(&self, nodes: &mut Vec<CanvasNode>) {
        match self.kind {
            HistoryKind::Add => insert_snapshots(nodes, &self.after),
            HistoryKind::Remove => remove_snapshots(nodes, &self.before),
            HistoryKind::Update | HistoryKind::Move | HistoryKind::Resize => {
                replace_snapshots(nodes, &self.after)
            }
        }
    }
}

fn remove_snapshots(nodes: &mut Vec<CanvasNode>, snapshots: &[NodeSnapshot]) {
    nodes.retain(|n| !snapshots.iter().any(|s| s.node.id == n.id));
}

fn insert_snapshots(nodes: &mut Vec<CanvasNode>, snapshots: &[NodeSnapshot]) {
    let mut ordered: Vec<&NodeSnapshot> = snapshots.iter().collect();
    ordered.sort_by_key(|s| s.index);
    for snapshot in ordered {
        if nodes.iter().any(|n| n.id == snapshot.node.id) {
            continue;
        }
        let at = snapshot.index.min(nodes.len());
        nodes.insert(at, snapshot.node.clone());
    }
}

fn replace_snapshots(nodes: &mut [CanvasNode], snapshots: &[NodeSnapshot]) {
    for snapshot in snapshots {
        if let Some(slot) = nodes.iter_mut().find(|n| n.id == snapshot.node.id) {
            *slot = snapshot.node.clone();
        }
    }
}

/// Bounded undo/redo stacks.
#[derive(Debug, Clone)]
pub struct History {
    past: VecDeque<HistoryRecord>,
    future: VecDeque<HistoryRecord>,
    max_depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        let max_depth = max_depth.max(1);
        Self {
            past: VecDeque::with_capacity(max_depth),
            future: VecDeque::new(),
            max_depth,
        }
    }

    /// Record a new mutation. Clears the redo stack.
    pub fn push(&mut self, record: HistoryRecord) {
        push_bounded(&mut self.past, record, self.max_depth);
        self.future.clear();
    }

    /// Undo the most recent record against `nodes`.
    pub fn undo(&mut self, nodes: &mut Vec<CanvasNode>) -> Option<HistoryKind> {
        let record = self.past.pop_back()?;
        record.apply_backward(nodes);
        let kind = record.kind;
        push_bounded(&mut self.future, record, self.max_depth);
        Some(kind)
    }

    /// Redo the most recently undone record against `nodes`.
    pub fn redo(&mut self, nodes: &mut Vec<CanvasNode>) -> Option<HistoryKind> {
        let record = self.future.pop_back()?;
        record.apply_forward(nodes);
        let kind = record.kind;
        push_bounded(&mut self.past, record, self.max_depth);
        Some(kind)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

fn push_bounded(stack: &mut VecDeque<HistoryRecord>, record: HistoryRecord, max: usize) {
    stack.push_back(record);
    if stack.len() > max {
        stack.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{create_node, move_node};
    use crate::id::NodeId;
    use crate::model::{NodeOptions, Point};
    use pretty_assertions::assert_eq;

    fn node(id: &str) -> CanvasNode {
        create_node(NodeId::intern(id), NodeOptions::new("box", Point::default()), 1)
    }

    #[test]
    fn undo_redo_move() {
        let original = node("a");
        let mut nodes = vec![original.clone()];
        let mut history = History::default();

        let moved = move_node(&original, Point::new(5.0, 5.0), 2);
        nodes[0] = moved.clone();
        history.push(HistoryRecord::changed(
            HistoryKind::Move,
            [NodeSnapshot { index: 0, node: original.clone() }],
            [NodeSnapshot { index: 0, node: moved.clone() }],
        ));

        assert_eq!(history.undo(&mut nodes), Some(HistoryKind::Move));
        assert_eq!(nodes, vec![original]);
        assert_eq!(history.redo(&mut nodes), Some(HistoryKind::Move));
        assert_eq!(nodes, vec![moved]);
    }

    #[test]
    fn redo_clears_on_new_action() {
        let mut nodes = vec![node("a")];
        let mut history = History::default();
        history.push(HistoryRecord::added([NodeSnapshot { index: 0, node: nodes[0].clone() }]));
        history.undo(&mut nodes);
        assert!(history.can_redo());

        history.push(HistoryRecord::added([NodeSnapshot { index: 0, node: node("b") }]));
        assert!(!history.can_redo());
    }

    #[test]
    fn max_depth_trims_oldest() {
        let mut nodes = Vec::new();
        let mut history = History::new(3);
        for i in 0..5 {
            let n = node(&format!("n{i}"));
            nodes.push(n.clone());
            history.push(HistoryRecord::added([NodeSnapshot { index: i, node: n }]));
        }
        let mut undo_count = 0;
        while history.undo(&mut nodes).is_some() {
            undo_count += 1;
        }
        assert_eq!(undo_count, 3);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn remove_restores_original_order() {
        let mut nodes = vec![node("r0"), node("r1"), node("r2"), node("r3")];
        let before = nodes.clone();
        let removed = [
            NodeSnapshot { index: 1, node: nodes[1].clone() },
            NodeSnapshot { index: 3, node: nodes[3].clone() },
        ];
        nodes.retain(|n| n.id != before[1].id && n.id != before[3].id);
        let mut history = History::default();
        history.push(HistoryRecord::removed(removed));

        history.undo(&mut nodes);
        assert_eq!(nodes, before);
        history.redo(&mut nodes);
        assert_eq!(nodes.len(), 2);
    }
}
