//! Canvas actions: pure node and viewport transforms.
//!
//! Every function takes its inputs by reference and returns a new value;
//! none of them touch shared state. The store composes them and is the only
//! place where the results are committed.

use crate::id::NodeId;
use crate::model::*;

/// Next `updatedAt` for a node: wall-clock `now`, but never less than one
/// millisecond past the previous stamp.
pub fn next_timestamp(previous: i64, now: i64) -> i64 {
    now.max(previous + 1)
}

/// Build a node from options, applying defaults (200×150, identity transform).
pub fn create_node(id: NodeId, opts: NodeOptions, now: i64) -> CanvasNode {
    let size = opts.size.unwrap_or_default();
    CanvasNode {
        id,
        node_type: opts.node_type,
        position: opts.position,
        size: Size::new(size.width.max(0.0), size.height.max(0.0)),
        transform: opts.transform.unwrap_or_default(),
        style: opts.style.unwrap_or_default(),
        data: opts.data,
        config: opts.config,
        interactions: opts.interactions,
        metadata: NodeMetadata {
            created_at: now,
            updated_at: now,
            locked: opts.locked,
            visible: opts.visible.unwrap_or(true),
            layer_name: opts.layer_name,
        },
        children: opts.children,
    }
}

/// Check the structural invariants a new node must satisfy.
pub fn validate_options(opts: &NodeOptions) -> Result<(), String> {
    if opts.node_type.trim().is_empty() {
        return Err("node type must not be empty".into());
    }
    if !opts.position.is_finite() {
        return Err("position must be finite".into());
    }
    if let Some(size) = opts.size
        && !size.is_finite()
    {
        return Err("size must be finite".into());
    }
    if let Some(t) = &opts.transform
        && !(t.rotate.is_finite() && t.scale.is_finite())
    {
        return Err("transform must be finite".into());
    }
    Ok(())
}

/// Drop any non-finite geometry from a patch. Returns the cleaned patch and
/// whether anything was removed.
pub fn sanitize_patch(mut patch: NodePatch) -> (NodePatch, bool) {
    let mut dropped = false;
    if patch.position.is_some_and(|p| !p.is_finite()) {
        patch.position = None;
        dropped = true;
    }
    if patch.size.is_some_and(|s| !s.is_finite()) {
        patch.size = None;
        dropped = true;
    }
    if patch
        .transform
        .as_ref()
        .is_some_and(|t| !(t.rotate.is_finite() && t.scale.is_finite()))
    {
        patch.transform = None;
        dropped = true;
    }
    (patch, dropped)
}

/// Shallow-merge `patch` into `node` and refresh `updatedAt`.
pub fn apply_patch(node: &CanvasNode, patch: &NodePatch, now: i64) -> CanvasNode {
    let mut next = node.clone();
    if let Some(t) = &patch.node_type {
        next.node_type = t.clone();
    }
    if let Some(p) = patch.position {
        next.position = p;
    }
    if let Some(s) = patch.size {
        next.size = Size::new(s.width.max(0.0), s.height.max(0.0));
    }
    if let Some(t) = &patch.transform {
        next.transform = t.clone();
    }
    if let Some(s) = &patch.style {
        next.style = s.clone();
    }
    if let Some(d) = &patch.data {
        next.data = d.clone();
    }
    if let Some(c) = &patch.config {
        next.config = c.clone();
    }
    if let Some(i) = &patch.interactions {
        next.interactions = i.clone();
    }
    if let Some(children) = &patch.children {
        next.children = children.clone();
    }
    if let Some(meta) = &patch.metadata {
        if let Some(locked) = meta.locked {
            next.metadata.locked = locked;
        }
        if let Some(visible) = meta.visible {
            next.metadata.visible = visible;
        }
        if let Some(layer) = &meta.layer_name {
            next.metadata.layer_name = Some(layer.clone());
        }
    }
    next.metadata.updated_at = next_timestamp(node.metadata.updated_at, now);
    next
}

pub fn move_node(node: &CanvasNode, position: Point, now: i64) -> CanvasNode {
    apply_patch(node, &NodePatch::position(position), now)
}

pub fn resize_node(node: &CanvasNode, size: Size, now: i64) -> CanvasNode {
    apply_patch(node, &NodePatch::size(size), now)
}

/// Duplicate a node under a new id, shifted by `offset`, with fresh
/// timestamps. Descendants get new ids from `fresh_id` so the render tree
/// keeps unique ids.
pub fn clone_node(
    node: &CanvasNode,
    new_id: NodeId,
    offset: Point,
    now: i64,
    fresh_id: &mut dyn FnMut() -> NodeId,
) -> CanvasNode {
    let mut cloned = node.clone();
    cloned.id = new_id;
    cloned.position = Point::new(node.position.x + offset.x, node.position.y + offset.y);
    cloned.metadata.created_at = now;
    cloned.metadata.updated_at = now;
    for child in &mut cloned.children {
        reassign_ids(child, now, fresh_id);
    }
    cloned
}

fn reassign_ids(node: &mut CanvasNode, now: i64, fresh_id: &mut dyn FnMut() -> NodeId) {
    node.id = fresh_id();
    node.metadata.created_at = now;
    node.metadata.updated_at = now;
    for child in &mut node.children {
        reassign_ids(child, now, fresh_id);
    }
}

pub fn toggle_lock(node: &CanvasNode, now: i64) -> CanvasNode {
    apply_patch(node, &NodePatch::locked(!node.metadata.locked), now)
}

pub fn toggle_visibility(node: &CanvasNode, now: i64) -> CanvasNode {
    apply_patch(node, &NodePatch::visible(!node.metadata.visible), now)
}

pub fn set_z_index(node: &CanvasNode, z: i64, now: i64) -> CanvasNode {
    let mut style = node.style.clone();
    style.z_index = Some(z);
    apply_patch(node, &NodePatch::style(style), now)
}

/// `max(zIndex) + 1` over all nodes (0 when empty).
pub fn front_z_index(nodes: &[CanvasNode]) -> i64 {
    nodes.iter().map(CanvasNode::z_index).max().unwrap_or(0) + 1
}

/// `min(zIndex) - 1` over all nodes (0 when empty).
pub fn back_z_index(nodes: &[CanvasNode]) -> i64 {
    nodes.iter().map(CanvasNode::z_index).min().unwrap_or(0) - 1
}

// ─── Viewport ────────────────────────────────────────────────────────────

pub fn pan_viewport(viewport: Viewport, dx: f64, dy: f64) -> Viewport {
    if !(dx.is_finite() && dy.is_finite()) {
        return viewport;
    }
    Viewport {
        x: viewport.x + dx,
        y: viewport.y + dy,
        zoom: viewport.zoom,
    }
}

/// Multiply zoom by `scale`, clamped to `[min_zoom, max_zoom]`. With a
/// center, the canvas point under `(cx, cy)` stays fixed on screen.
pub fn zoom_viewport(
    viewport: Viewport,
    scale: f64,
    center: Option<Point>,
    min_zoom: f64,
    max_zoom: f64,
) -> Viewport {
    if !scale.is_finite() || scale <= 0.0 {
        return viewport;
    }
    let zoom = (viewport.zoom * scale).clamp(min_zoom, max_zoom);
    match center {
        Some(c) if c.is_finite() && viewport.zoom > 0.0 => {
            let ratio = zoom / viewport.zoom;
            Viewport {
                x: c.x - (c.x - viewport.x) * ratio,
                y: c.y - (c.y - viewport.y) * ratio,
                zoom,
            }
        }
        _ => Viewport { zoom, ..viewport },
    }
}

pub fn reset_viewport() -> Viewport {
    Viewport::default()
}
