//! Integration tests: undo/redo over the canvas store.
//!
//! Every mutation must be reversible, and undo×N followed by redo×N must
//! reproduce the exact render tree at each intermediate step.

use noyau_core::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn seeded_store() -> (CanvasStore, NodeId, NodeId) {
    let mut store = CanvasStore::new();
    let gauge = store
        .add_node(NodeOptions::new("gauge", Point::new(10.0, 10.0)))
        .unwrap();
    let chart = store
        .add_node(NodeOptions::new("chart", Point::new(300.0, 10.0)).with_z_index(2))
        .unwrap();
    (store, gauge, chart)
}

// ─── Round-trip ─────────────────────────────────────────────────────────

#[test]
fn undo_all_then_redo_all_replays_every_step() {
    let (mut store, gauge, chart) = seeded_store();
    let mut snapshots = vec![store.render_tree().to_vec()];

    let mutations: Vec<Box<dyn Fn(&mut CanvasStore)>> = vec![
        Box::new(move |s: &mut CanvasStore| s.move_node(gauge, Point::new(40.0, 40.0))),
        Box::new(move |s: &mut CanvasStore| s.resize_node(chart, Size::new(400.0, 300.0))),
        Box::new(move |s: &mut CanvasStore| s.update_node(gauge, NodePatch::data(JsonMap::from_iter([("v".to_string(), json!(1))])))),
        Box::new(move |s: &mut CanvasStore| s.toggle_node_visibility(chart)),
        Box::new(move |s: &mut CanvasStore| s.bring_node_to_front(gauge)),
        Box::new(move |s: &mut CanvasStore| {
            s.clone_node(chart, None);
        }),
        Box::new(move |s: &mut CanvasStore| s.remove_node(gauge)),
        Box::new(move |s: &mut CanvasStore| s.toggle_node_lock(chart)),
    ];

    for mutate in &mutations {
        mutate(&mut store);
        snapshots.push(store.render_tree().to_vec());
    }

    for expected in snapshots.iter().rev().skip(1) {
        assert!(store.undo());
        assert_eq!(store.render_tree(), expected.as_slice());
    }
    for expected in snapshots.iter().skip(1) {
        assert!(store.redo());
        assert_eq!(store.render_tree(), expected.as_slice());
    }
    assert!(!store.can_redo());
}

#[test]
fn undo_and_redo_on_empty_history_report_false() {
    let mut store = CanvasStore::new();
    assert!(!store.undo());
    assert!(!store.redo());
}

// ─── Ordering ───────────────────────────────────────────────────────────

#[test]
fn undo_remove_restores_render_order() {
    let mut store = CanvasStore::new();
    let ids = store
        .add_nodes(vec![
            NodeOptions::new("a", Point::default()),
            NodeOptions::new("b", Point::default()),
            NodeOptions::new("c", Point::default()),
        ])
        .unwrap();
    let before = store.render_tree().to_vec();

    store.remove_nodes(&[ids[0], ids[2]]);
    assert_eq!(store.node_count(), 1);

    store.undo();
    assert_eq!(store.render_tree(), before.as_slice());
}

#[test]
fn batch_add_is_one_history_entry() {
    let mut store = CanvasStore::new();
    store
        .add_nodes(vec![
            NodeOptions::new("a", Point::default()),
            NodeOptions::new("b", Point::default()),
        ])
        .unwrap();
    assert_eq!(store.history().undo_len(), 1);
    store.undo();
    assert_eq!(store.node_count(), 0);
}

// ─── Selection & limits ─────────────────────────────────────────────────

#[test]
fn undo_prunes_selection() {
    let mut store = CanvasStore::new();
    let id = store.add_node(NodeOptions::new("gauge", Point::default())).unwrap();
    assert_eq!(store.selected_ids(), &[id]);

    store.undo();
    assert!(store.selected_ids().is_empty());
}

#[test]
fn new_mutation_clears_redo() {
    let (mut store, gauge, _) = seeded_store();
    store.move_node(gauge, Point::new(1.0, 1.0));
    store.undo();
    assert!(store.can_redo());

    store.move_node(gauge, Point::new(2.0, 2.0));
    assert!(!store.can_redo());
}

#[test]
fn history_depth_is_bounded() {
    let mut store = CanvasStore::with_config(StoreConfig {
        history_depth: 5,
        ..StoreConfig::default()
    });
    let id = store.add_node(NodeOptions::new("gauge", Point::default())).unwrap();
    for i in 0..20 {
        store.move_node(id, Point::new(i as f64, 0.0));
    }
    let mut undone = 0;
    while store.undo() {
        undone += 1;
    }
    assert_eq!(undone, 5);
    assert_eq!(store.get_node(id).unwrap().position, Point::new(14.0, 0.0));
}

#[test]
fn live_data_does_not_enter_history() {
    let (mut store, gauge, _) = seeded_store();
    let depth = store.history().undo_len();
    for i in 0..10 {
        store.set_node_data(gauge, "reading", json!(i));
    }
    assert_eq!(store.history().undo_len(), depth);
}
