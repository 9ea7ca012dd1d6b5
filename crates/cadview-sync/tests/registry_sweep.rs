// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]

mod common;

use cadview_sync::{ManagedViewer, PlacementKey, SyncState, ViewerContext};
use common::{inline, named, spawn, updates, with_scene, TestDocument, TestShell};
use serde_json::{json, Value};

#[test]
fn creating_an_inline_viewer_sweeps_removed_cells() {
    let doc = TestDocument::default();
    doc.add("cell-a");
    doc.add("cell-b");
    let ctx = ViewerContext::new(doc.clone(), TestShell::default());

    let a = spawn(&ctx, inline("cell-a"), with_scene(json!({})));
    let b = spawn(&ctx, inline("cell-b"), with_scene(json!({})));

    doc.remove("cell-a");
    doc.add("cell-c");
    let c = spawn(&ctx, inline("cell-c"), with_scene(json!({})));

    assert_eq!(a.borrow().state(), SyncState::Disposed);
    assert_eq!(a.borrow().viewer().dispose_count, 1);
    assert!(updates(&a.borrow())
        .iter()
        .any(|batch| batch.get("disposed") == Some(&Value::Bool(true))));
    assert_eq!(b.borrow().state(), SyncState::Ready);
    assert_eq!(c.borrow().state(), SyncState::Ready);

    let keys = ctx.with_registry(|registry| registry.keys());
    assert_eq!(
        keys,
        vec![
            PlacementKey::Inline("cell-b".into()),
            PlacementKey::Inline("cell-c".into())
        ]
    );
}

#[test]
fn reusing_a_title_replaces_the_named_viewer() {
    let shell = TestShell::default();
    let log = shell.0.clone();
    let ctx = ViewerContext::new(TestDocument::default(), shell);

    let first = spawn(&ctx, named("Parts"), with_scene(json!({})));
    let second = spawn(&ctx, named("Parts"), with_scene(json!({})));

    assert_eq!(first.borrow().state(), SyncState::Disposed);
    assert_eq!(second.borrow().state(), SyncState::Ready);
    assert_eq!(
        *log.borrow(),
        vec!["attach:Parts", "detach:Parts", "attach:Parts"]
    );
    assert_eq!(ctx.live_named(), vec!["Parts".to_owned()]);
    assert!(ctx
        .lookup(&PlacementKey::Named("Parts".into()))
        .is_some_and(|live| !live.borrow().is_disposed()));
}

#[test]
fn shutdown_disposes_everything() {
    let doc = TestDocument::default();
    doc.add("cell");
    let ctx = ViewerContext::new(doc, TestShell::default());
    let cell = spawn(&ctx, inline("cell"), with_scene(json!({})));
    let panel = spawn(&ctx, named("Panel"), with_scene(json!({})));
    ctx.set_default("Panel");
    assert!(ctx.default_viewer().is_some());

    assert_eq!(ctx.dispose_all(), 2);
    assert_eq!(cell.borrow().state(), SyncState::Disposed);
    assert_eq!(panel.borrow().state(), SyncState::Disposed);
    assert!(ctx.default_viewer().is_none());
    assert!(ctx.with_registry(|registry| registry.is_empty()));
}

#[test]
fn dropped_engines_leave_no_live_entry() {
    let ctx = ViewerContext::headless();
    let engine = spawn(&ctx, inline("cell"), with_scene(json!({})));
    drop(engine);
    assert!(ctx.lookup(&PlacementKey::Inline("cell".into())).is_none());
    assert_eq!(ctx.sweep_inline(), 0);
}
