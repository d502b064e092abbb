//! Core data model for the Noyau canvas.
//!
//! The render tree is a flat, ordered list of [`CanvasNode`]s. Order is kept
//! for stable iteration only; stacking is derived from `style.zIndex`
//! (default 0). Nodes carry authoring-time `config`, live `data` filled in by
//! data sources, and the interaction definitions the interaction engine
//! dispatches on.
//!
//! Every type here serializes to the camelCase JSON shape of the persisted
//! document (`{ nodes, config, version, exportTime }`).

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object used for node `data`, node `config` and action params.
pub type JsonMap = Map<String, Value>;

/// Version stamped into exported documents.
pub const DOCUMENT_VERSION: &str = "1.0.0";

// ─── Geometry ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_finite(&self) -> bool {
        self.width.is_finite() && self.height.is_finite()
    }
}

impl Default for Size {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 150.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transform {
    #[serde(default)]
    pub rotate: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_x: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_y: Option<bool>,
}

fn default_scale() -> f64 {
    1.0
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            rotate: 0.0,
            scale: 1.0,
            flip_x: None,
            flip_y: None,
        }
    }
}

/// Axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a normalized rect from two corners in any order.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains_point(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

// ─── Style & metadata ────────────────────────────────────────────────────

/// Visual hints. Only `zIndex` is interpreted by the engine; everything
/// else is carried through for the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStyle {
    #[serde(rename = "zIndex", default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

impl NodeStyle {
    pub fn z_index(&self) -> i64 {
        self.z_index.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Milliseconds since the Unix epoch; strictly increases per mutation.
    pub updated_at: i64,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
}

fn default_true() -> bool {
    true
}

// ─── Interactions ────────────────────────────────────────────────────────

/// A named, event-triggered set of responses attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Event name this interaction fires on (`click`, `hover`, `dataChange`, …).
    pub event: String,
    #[serde(default)]
    pub responses: Vec<InteractionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_property: Option<String>,
    /// Debounce window in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce: Option<u64>,
    /// Throttle window in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throttle: Option<u64>,
}

impl InteractionDefinition {
    pub fn new(id: &str, name: &str, event: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            enabled: true,
            event: event.to_string(),
            responses: Vec::new(),
            watched_property: None,
            debounce: None,
            throttle: None,
        }
    }

    pub fn with_response(mut self, response: InteractionResponse) -> Self {
        self.responses.push(response);
        self
    }
}

/// One configured action inside an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResponse {
    /// Handler type key, e.g. `navigateToUrl`.
    pub action: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay before execution, in milliseconds.
    #[serde(default)]
    pub delay: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<NodeId>,
}

impl InteractionResponse {
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            name: String::new(),
            enabled: true,
            delay: 0,
            params: None,
            condition: None,
            target_node_id: None,
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params
            .get_or_insert_with(JsonMap::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn with_condition(mut self, condition: &str) -> Self {
        self.condition = Some(condition.to_string());
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = delay_ms;
        self
    }

    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target_node_id = Some(target);
        self
    }

    /// Read a param, returning `None` for absent keys.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(key))
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// One addressable visual element on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasNode {
    pub id: NodeId,
    /// Key into the host's component registry.
    #[serde(rename = "type")]
    pub node_type: String,
    pub position: Point,
    #[serde(default)]
    pub size: Size,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub style: NodeStyle,
    #[serde(default)]
    pub data: JsonMap,
    #[serde(default)]
    pub config: JsonMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactions: Vec<InteractionDefinition>,
    pub metadata: NodeMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CanvasNode>,
}

impl CanvasNode {
    pub fn bounds(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.size.width,
            self.size.height,
        )
    }

    pub fn z_index(&self) -> i64 {
        self.style.z_index()
    }

    pub fn is_locked(&self) -> bool {
        self.metadata.locked
    }

    pub fn is_visible(&self) -> bool {
        self.metadata.visible
    }

    /// Visit this node and all descendants, depth-first.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a CanvasNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}

/// Options for building a new node. Everything but `type` and `position`
/// has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOptions {
    #[serde(default)]
    pub id: Option<NodeId>,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Point,
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default)]
    pub transform: Option<Transform>,
    #[serde(default)]
    pub style: Option<NodeStyle>,
    #[serde(default)]
    pub data: JsonMap,
    #[serde(default)]
    pub config: JsonMap,
    #[serde(default)]
    pub interactions: Vec<InteractionDefinition>,
    #[serde(default)]
    pub layer_name: Option<String>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub children: Vec<CanvasNode>,
}

impl NodeOptions {
    pub fn new(node_type: &str, position: Point) -> Self {
        Self {
            node_type: node_type.to_string(),
            position,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_z_index(mut self, z: i64) -> Self {
        self.style.get_or_insert_with(NodeStyle::default).z_index = Some(z);
        self
    }

    pub fn with_data(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    pub fn with_config(mut self, key: &str, value: Value) -> Self {
        self.config.insert(key.to_string(), value);
        self
    }

    pub fn with_interaction(mut self, interaction: InteractionDefinition) -> Self {
        self.interactions.push(interaction);
        self
    }

    pub fn with_layer(mut self, layer: &str) -> Self {
        self.layer_name = Some(layer.to_string());
        self
    }
}

/// Partial node update. Top-level fields replace the node's field wholesale
/// (shallow merge); `metadata` is patched field by field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<NodeStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactions: Option<Vec<InteractionDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<CanvasNode>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer_name: Option<String>,
}

impl NodePatch {
    pub fn position(position: Point) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn size(size: Size) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn style(style: NodeStyle) -> Self {
        Self {
            style: Some(style),
            ..Self::default()
        }
    }

    pub fn data(data: JsonMap) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn visible(visible: bool) -> Self {
        Self {
            metadata: Some(MetadataPatch {
                visible: Some(visible),
                ..MetadataPatch::default()
            }),
            ..Self::default()
        }
    }

    pub fn locked(locked: bool) -> Self {
        Self {
            metadata: Some(MetadataPatch {
                locked: Some(locked),
                ..MetadataPatch::default()
            }),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ─── Canvas-level state ──────────────────────────────────────────────────

/// Pan/zoom state. `zoom` is clamped by the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Unique, and always a subset of the current node ids.
    pub selected_ids: Vec<NodeId>,
    pub hovered_id: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanvasMode {
    #[default]
    Design,
    Preview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridConfig {
    pub enabled: bool,
    pub size: f64,
    pub snap: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            size: 20.0,
            snap: false,
        }
    }
}

/// Authoring-time canvas settings, persisted with the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
    pub background: String,
    pub grid: GridConfig,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            background: "#ffffff".to_string(),
            grid: GridConfig::default(),
        }
    }
}

/// Persisted/exported canvas document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasDocument {
    pub nodes: Vec<CanvasNode>,
    #[serde(default)]
    pub config: CanvasConfig,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub export_time: i64,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rect_geometry() {
        let a = Rect::new(0.0, 0.0, 100.0, 50.0);
        let b = Rect::new(90.0, 40.0, 20.0, 20.0);
        assert!(a.intersects(&b));
        assert!(!a.contains_rect(&b));
        assert!(a.contains_point(100.0, 50.0));
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 110.0, 60.0));
        assert_eq!(
            Rect::from_corners(Point::new(10.0, 10.0), Point::new(0.0, 5.0)),
            Rect::new(0.0, 5.0, 10.0, 5.0)
        );
    }

    #[test]
    fn node_json_uses_camel_case() {
        let node: CanvasNode = serde_json::from_value(json!({
            "id": "g1",
            "type": "gauge",
            "position": { "x": 1.0, "y": 2.0 },
            "style": { "zIndex": 3, "color": "red" },
            "metadata": { "createdAt": 10, "updatedAt": 11, "layerName": "top" }
        }))
        .unwrap();

        assert_eq!(node.size, Size::new(200.0, 150.0));
        assert_eq!(node.transform, Transform::default());
        assert_eq!(node.z_index(), 3);
        assert_eq!(node.style.extra.get("color"), Some(&json!("red")));
        assert!(node.is_visible());
        assert!(!node.is_locked());

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["metadata"]["layerName"], json!("top"));
        assert_eq!(back["style"]["zIndex"], json!(3));
        assert!(back.get("interactions").is_none());
    }

    #[test]
    fn response_deserializes_defaults() {
        let r: InteractionResponse = serde_json::from_value(json!({
            "action": "showNotification",
            "targetNodeId": "n2"
        }))
        .unwrap();
        assert!(r.enabled);
        assert_eq!(r.delay, 0);
        assert_eq!(r.target_node_id, Some(NodeId::intern("n2")));
    }

    #[test]
    fn empty_patch() {
        assert!(NodePatch::default().is_empty());
        assert!(!NodePatch::visible(false).is_empty());
    }
}
