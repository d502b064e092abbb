//! Canvas selectors: read-only queries over the render tree.
//!
//! Hit testing walks nodes front-to-back (highest `zIndex` first, later
//! nodes first among equals) so the topmost node under a point wins.
//! Geometry is axis-aligned; `transform.rotate` is ignored.

use crate::id::NodeId;
use crate::model::*;
use std::collections::BTreeMap;

/// Which region test `nodes_in_region` applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionMode {
    /// Node bounds overlap the region.
    #[default]
    Intersect,
    /// Node bounds lie entirely inside the region.
    Contain,
}

pub fn find_node(nodes: &[CanvasNode], id: NodeId) -> Option<&CanvasNode> {
    nodes.iter().find(|n| n.id == id)
}

pub fn find_node_index(nodes: &[CanvasNode], id: NodeId) -> Option<usize> {
    nodes.iter().position(|n| n.id == id)
}

/// Nodes for the given ids, in id order; unknown ids are skipped.
pub fn find_nodes<'a>(nodes: &'a [CanvasNode], ids: &[NodeId]) -> Vec<&'a CanvasNode> {
    ids.iter().filter_map(|id| find_node(nodes, *id)).collect()
}

pub fn contains_node(nodes: &[CanvasNode], id: NodeId) -> bool {
    nodes.iter().any(|n| n.id == id)
}

/// Every id in the tree, descendants included.
pub fn all_ids(nodes: &[CanvasNode]) -> Vec<NodeId> {
    let mut ids = Vec::with_capacity(nodes.len());
    for node in nodes {
        node.walk(&mut |n| ids.push(n.id));
    }
    ids
}

/// Nodes ordered back-to-front by `zIndex`; ties keep tree order.
pub fn sorted_by_z_index(nodes: &[CanvasNode]) -> Vec<&CanvasNode> {
    let mut sorted: Vec<&CanvasNode> = nodes.iter().collect();
    sorted.sort_by_key(|n| n.z_index());
    sorted
}

/// Topmost visible node containing `(px, py)`, or `None` for background.
pub fn node_at_point(nodes: &[CanvasNode], px: f64, py: f64) -> Option<&CanvasNode> {
    let hit = sorted_by_z_index(nodes)
        .into_iter()
        .rev()
        .find(|n| n.is_visible() && n.bounds().contains_point(px, py));
    log::trace!("hit test ({px}, {py}) -> {:?}", hit.map(|n| n.id));
    hit
}

/// Visible nodes inside or overlapping `region`, for marquee selection.
pub fn nodes_in_region(nodes: &[CanvasNode], region: Rect, mode: RegionMode) -> Vec<&CanvasNode> {
    nodes
        .iter()
        .filter(|n| n.is_visible())
        .filter(|n| match mode {
            RegionMode::Intersect => region.intersects(&n.bounds()),
            RegionMode::Contain => region.contains_rect(&n.bounds()),
        })
        .collect()
}

/// Union of the bounds of `nodes`; `None` when empty.
pub fn bounding_box<'a>(nodes: impl IntoIterator<Item = &'a CanvasNode>) -> Option<Rect> {
    nodes
        .into_iter()
        .map(CanvasNode::bounds)
        .reduce(|acc, b| acc.union(&b))
}

pub fn node_count_by_type(nodes: &[CanvasNode]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for node in nodes {
        *counts.entry(node.node_type.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn visible_nodes(nodes: &[CanvasNode]) -> Vec<&CanvasNode> {
    nodes.iter().filter(|n| n.is_visible()).collect()
}

pub fn locked_nodes(nodes: &[CanvasNode]) -> Vec<&CanvasNode> {
    nodes.iter().filter(|n| n.is_locked()).collect()
}

pub fn nodes_in_layer<'a>(nodes: &'a [CanvasNode], layer: &str) -> Vec<&'a CanvasNode> {
    nodes
        .iter()
        .filter(|n| n.metadata.layer_name.as_deref() == Some(layer))
        .collect()
}

/// Case-insensitive fuzzy search over id, type and layer name. Results are
/// ordered best match first; ties keep tree order. An empty query matches
/// nothing.
pub fn search_nodes<'a>(nodes: &'a [CanvasNode], query: &str) -> Vec<&'a CanvasNode> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(i64, usize, &CanvasNode)> = nodes
        .iter()
        .enumerate()
        .filter_map(|(i, n)| {
            let fields = [
                Some(n.id.as_str()),
                Some(n.node_type.as_str()),
                n.metadata.layer_name.as_deref(),
            ];
            fields
                .into_iter()
                .flatten()
                .filter_map(|f| fuzzy_score(&f.to_lowercase(), &needle))
                .max()
                .map(|score| (score, i, n))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.into_iter().map(|(_, _, n)| n).collect()
}

/// Subsequence match score: consecutive hits score double, substring and
/// prefix matches get a bonus. `None` if `needle` is not a subsequence.
fn fuzzy_score(haystack: &str, needle: &str) -> Option<i64> {
    let mut score = 0i64;
    let mut hay = haystack.chars();
    let mut prev_matched = false;
    for wanted in needle.chars() {
        let mut found = false;
        for c in hay.by_ref() {
            if c == wanted {
                score += if prev_matched { 2 } else { 1 };
                prev_matched = true;
                found = true;
                break;
            }
            prev_matched = false;
        }
        if !found {
            return None;
        }
    }
    if haystack.starts_with(needle) {
        score += 10;
    } else if haystack.contains(needle) {
        score += 5;
    }
    Some(score)
}
