// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use cadview_app_core::prefs::BridgePrefs;
use cadview_codec::{encode_f32, MockViewer};
use cadview_port::{Anchor, HostDocument, ShellPort};
use cadview_sync::{OutboundMessage, Placement, SyncEngine, ViewerContext};
use serde_json::{json, Map, Value};

pub type Engine = SyncEngine<MockViewer, Vec<OutboundMessage>>;

/// One triangle, shipped as an instance and referenced by the only part.
pub fn scene_payload() -> Value {
    let vertices = encode_f32(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[3, 3]).unwrap();
    json!({
        "instances": [{"vertices": vertices, "triangles": [0, 1, 2]}],
        "shapes": {
            "name": "Group",
            "id": "/Group",
            "parts": [{"name": "Tri", "id": "/Group/Tri", "type": "shapes", "shape": {"ref": 0}}]
        }
    })
}

/// Initial model with a scene, states and any `extra` keys.
pub fn with_scene(extra: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("shapes".into(), scene_payload());
    map.insert("states".into(), json!({"/Group/Tri": [1, 1]}));
    if let Value::Object(extra) = extra {
        map.extend(extra);
    }
    map
}

pub fn inline(container_id: &str) -> Placement {
    Placement::Inline {
        container_id: container_id.into(),
    }
}

pub fn named(title: &str) -> Placement {
    Placement::Named {
        title: title.into(),
        anchor: Anchor::Right,
    }
}

/// Route engine logs to the test harness; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .with_target(false)
        .without_time()
        .try_init();
}

pub fn spawn(ctx: &ViewerContext, placement: Placement, initial: Map<String, Value>) -> Rc<RefCell<Engine>> {
    init_tracing();
    SyncEngine::spawn(
        ctx,
        placement,
        initial,
        Vec::new(),
        &BridgePrefs::default(),
        MockViewer::with_display,
    )
    .unwrap()
}

/// Outbound `update` batches, in order.
pub fn updates(engine: &Engine) -> Vec<Map<String, Value>> {
    engine
        .channel()
        .iter()
        .filter_map(|message| match message {
            OutboundMessage::Update { changes } => Some(changes.clone()),
            OutboundMessage::MethodResult { .. } => None,
        })
        .collect()
}

/// Outbound `method_result` replies, in order.
pub fn replies(engine: &Engine) -> Vec<(u64, Value)> {
    engine
        .channel()
        .iter()
        .filter_map(|message| match message {
            OutboundMessage::MethodResult { id, result } => Some((*id, result.clone())),
            OutboundMessage::Update { .. } => None,
        })
        .collect()
}

/// Host document whose containers can be removed mid-test.
#[derive(Clone, Default)]
pub struct TestDocument(pub Rc<RefCell<HashSet<String>>>);

impl TestDocument {
    pub fn add(&self, id: &str) {
        self.0.borrow_mut().insert(id.to_owned());
    }

    pub fn remove(&self, id: &str) {
        self.0.borrow_mut().remove(id);
    }
}

impl HostDocument for TestDocument {
    fn contains_container(&self, container_id: &str) -> bool {
        self.0.borrow().contains(container_id)
    }
}

/// Shell recording attach/detach calls.
#[derive(Clone, Default)]
pub struct TestShell(pub Rc<RefCell<Vec<String>>>);

impl ShellPort for TestShell {
    fn attach(&mut self, title: &str, _anchor: &Anchor) {
        self.0.borrow_mut().push(format!("attach:{title}"));
    }

    fn detach(&mut self, title: &str) {
        self.0.borrow_mut().push(format!("detach:{title}"));
    }
}
