// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use cadview_port::{AnimationControl, CameraPreset, RotateAxis};
use cadview_sync::{InboundMessage, MethodCall, OutboundMessage, SyncState, ViewerContext};
use common::{inline, replies, spawn, updates, with_scene, Engine};
use serde_json::{json, Value};

fn ready(extra: Value) -> (ViewerContext, Rc<RefCell<Engine>>) {
    let ctx = ViewerContext::headless();
    let engine = spawn(&ctx, inline("cell"), with_scene(extra));
    engine.borrow_mut().channel_mut().clear();
    (ctx, engine)
}

fn call(id: Option<u64>, method: &str, args: Option<&str>) -> MethodCall {
    MethodCall {
        id,
        method: method.into(),
        args: args.map(Into::into),
    }
}

fn error_of(result: &Value) -> &str {
    result["error"].as_str().unwrap_or_default()
}

#[test]
fn preset_camera_reports_pose_and_replies_once() {
    let (_ctx, engine) = ready(json!({}));
    let mut engine = engine.borrow_mut();
    engine.invoke(&call(Some(1), r#"["viewer","camera","presetCamera"]"#, Some(r#"["top"]"#)));

    assert_eq!(engine.viewer().last_preset, Some(CameraPreset::Top));
    assert_eq!(
        engine.channel().last(),
        Some(&OutboundMessage::MethodResult {
            id: 1,
            result: Value::Null
        })
    );
    assert_eq!(replies(&engine).len(), 1);
    let batches = updates(&engine);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0]["position"], json!([0.0, 0.0, 1.0]));
}

#[test]
fn rotations_respect_the_control_model() {
    let (_ctx, engine) = ready(json!({}));
    let mut engine = engine.borrow_mut();
    engine.invoke(&call(Some(2), r#"["viewer","controls","rotateUp"]"#, Some("[10]")));
    engine.invoke(&call(Some(3), r#"["viewer","controls","rotateX"]"#, Some("[30]")));

    assert_eq!(engine.viewer().rotations, vec![(RotateAxis::X, 30.0)]);
    let replies = replies(&engine);
    assert_eq!(replies.len(), 2);
    assert!(error_of(&replies[0].1).contains("orbit"));
    assert_eq!(replies[1], (3, Value::Null));

    let (_ctx, orbit) = ready(json!({"control": "orbit"}));
    let mut orbit = orbit.borrow_mut();
    orbit.invoke(&call(None, r#"["viewer","controls","rotateLeft"]"#, Some("[45]")));
    assert_eq!(orbit.viewer().rotations, vec![(RotateAxis::Left, 45.0)]);
    assert!(replies_are_empty(&orbit));
}

fn replies_are_empty(engine: &Engine) -> bool {
    replies(engine).is_empty()
}

#[test]
fn calls_outside_the_capability_tree_are_refused() {
    let (_ctx, engine) = ready(json!({}));
    let mut engine = engine.borrow_mut();
    engine.invoke(&call(Some(4), r#"["viewer","renderer","dispose"]"#, None));
    engine.invoke(&call(Some(5), r#"["viewer","clear"]"#, None));
    engine.invoke(&call(Some(6), "not json", None));
    engine.invoke(&call(None, r#"["viewer","clear"]"#, None));

    let replies = replies(&engine);
    assert_eq!(replies.len(), 3);
    assert!(error_of(&replies[0].1).starts_with("unresolved method path"));
    assert!(error_of(&replies[1].1).starts_with("unknown method"));
    assert!(error_of(&replies[2].1).starts_with("malformed method path"));
    assert_eq!(engine.state(), SyncState::Ready);
    assert_eq!(engine.viewer().clear_count, 0);
}

#[test]
fn pin_as_png_writes_result_then_disposes() {
    let (ctx, engine) = ready(json!({"image_id": "img-7"}));
    let mut engine = engine.borrow_mut();
    engine.handle(InboundMessage::Method(call(Some(9), r#"["pinAsPng"]"#, None)));

    let batches = updates(&engine);
    assert_eq!(batches.len(), 2);
    let result = &batches[0]["result"];
    assert_eq!(result["display_id"], json!("img-7"));
    assert_eq!(result["width"], json!(800));
    assert_eq!(result["height"], json!(600));
    assert!(result["src"]
        .as_str()
        .is_some_and(|src| src.starts_with("data:image/png;base64,")));
    assert_eq!(batches[1]["disposed"], json!(true));
    assert_eq!(replies(&engine), vec![(9, Value::Null)]);
    assert_eq!(engine.state(), SyncState::Disposed);
    assert!(ctx.with_registry(|registry| registry.is_empty()));
}

#[test]
fn save_and_export_leave_the_viewer_alive() {
    let (_ctx, engine) = ready(json!({}));
    let mut engine = engine.borrow_mut();
    engine.invoke(&call(None, r#"["saveAsPng"]"#, Some(r#"["shot.png"]"#)));
    engine.invoke(&call(Some(11), r#"["exportImage"]"#, None));

    let batches = updates(&engine);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0]["result"]["filename"], json!("shot.png"));
    let replies = replies(&engine);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].1["width"], json!(800));
    assert_eq!(engine.state(), SyncState::Ready);
}

#[test]
fn camera_pose_and_animation_controls() {
    let (_ctx, engine) = ready(json!({}));
    let mut engine = engine.borrow_mut();
    engine.invoke(&call(
        None,
        r#"["viewer","setCameraPose"]"#,
        Some(r#"[{"zoom": 3.0, "target": [1.0, 0.0, 0.0]}]"#),
    ));
    engine.invoke(&call(None, r#"["viewer","controlAnimation"]"#, Some(r#"["play"]"#)));
    engine.invoke(&call(None, r#"["viewer","update"]"#, Some("null")));

    assert_eq!(engine.viewer().camera.zoom, 3.0);
    let batches = updates(&engine);
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0]["zoom"], json!(3.0));
    assert_eq!(batches[0]["target"], json!([1.0, 0.0, 0.0]));
    assert_eq!(engine.viewer().animation_controls, vec![AnimationControl::Play]);
    assert!(engine.viewer().update_count >= 2);
}

#[test]
fn methods_after_dispose() {
    let (_ctx, engine) = ready(json!({}));
    let mut engine = engine.borrow_mut();
    engine.invoke(&call(Some(1), r#"["viewer","dispose"]"#, None));
    engine.invoke(&call(Some(2), r#"["viewer","dispose"]"#, None));
    engine.invoke(&call(Some(3), r#"["viewer","update"]"#, None));

    let replies = replies(&engine);
    assert_eq!(replies[0], (1, Value::Null));
    assert_eq!(replies[1], (2, Value::Null));
    assert_eq!(error_of(&replies[2].1), "viewer instance disposed");
    assert_eq!(engine.viewer().dispose_count, 1);
}
