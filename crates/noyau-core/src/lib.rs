//! Noyau canvas core: node model, pure actions and selectors, undo/redo
//! history and the canvas store that owns them.
//!
//! - [`model`]: nodes, geometry, interaction definitions, canvas document
//! - [`actions`]: pure node/viewport transforms
//! - [`selectors`]: read-only queries (hit testing, regions, search)
//! - [`history`]: bounded snapshot-based undo/redo
//! - [`store`]: [`CanvasStore`], the sole owner of canvas state
//! - [`handle`]: [`CanvasHandle`], the shared context object
//! - [`path`]: dot-path accessor over JSON payloads

pub mod actions;
pub mod error;
pub mod handle;
pub mod history;
pub mod id;
pub mod model;
pub mod path;
pub mod selectors;
pub mod store;

pub use error::{CanvasError, ErrorCategory};
pub use handle::CanvasHandle;
pub use history::{History, HistoryKind};
pub use id::NodeId;
pub use model::*;
pub use path::{DataPath, extract_path};
pub use selectors::RegionMode;
pub use store::{CanvasStore, ListenerId, StoreChange, StoreConfig, StoreEvent};
