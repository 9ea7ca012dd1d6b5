// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-instance state synchronization engine.
//!
//! Lifecycle: `Uninitialized → Rendering → Ready → (Updating → Ready)* → Disposed`.
//!
//! While the instance is `Uninitialized` or `Rendering`, remote property
//! changes are stored in the mirror but not applied; the next render reads the
//! mirror, so the viewer picks them up then. Once `Disposed`, every inbound
//! change is ignored.

use std::cell::RefCell;
use std::rc::Rc;

use cadview_app_core::prefs::{BridgePrefs, SyncPrefs};
use cadview_codec::SceneCodec;
use cadview_port::{
    tracks_duration, Anchor, AnimationControl, AnimationTrack, CameraPose, ControlKind,
    DisplayOptions, ImageCapture, Quat, RenderOptions, SceneDocument, Vec3, ViewerError,
    ViewerOptions, ViewerPort,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::invoke::{InvokeError, MethodRequest, RemoteMethod, UNSERIALIZABLE};
use crate::message::{InboundMessage, MethodCall, OutboundMessage, RemoteChannel};
use crate::model::RemoteModel;
use crate::property::{ModelKey, PropertyChange, PropertyKind};
use crate::registry::{InstanceId, ManagedViewer, Placement, SharedViewer, ViewerContext};
use crate::tracks::parse_tracks;
use crate::transport::InboundHandler;
use crate::SyncError;

/// Lifecycle state of one viewer instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Created, no scene rendered yet.
    Uninitialized,
    /// Between `initialize=true` and the render that follows.
    Rendering,
    /// Scene rendered; remote changes are applied.
    Ready,
    /// A remote change is being applied.
    Updating,
    /// Terminal.
    Disposed,
}

/// What [`SyncEngine::apply_remote_change`] did with a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Applied to the viewer.
    Applied,
    /// The viewer already held the value within tolerance.
    Unchanged,
    /// Stored in the mirror; not a viewer property.
    Recorded,
    /// Stored in the mirror while (re)initializing; applied by the next render.
    Suppressed,
    /// Unknown key or out-of-domain value; nothing changed.
    Rejected,
    /// The instance is disposed.
    Ignored,
}

const CAMERA_KINDS: [PropertyKind; 4] = [
    PropertyKind::Position,
    PropertyKind::Quaternion,
    PropertyKind::Target,
    PropertyKind::Zoom,
];

/// Placement implied by the initial model: a non-empty `title` means a named
/// side panel, otherwise the viewer lives in `container_id`.
pub fn placement_for(values: &Map<String, Value>, container_id: &str) -> Placement {
    match values
        .get("title")
        .and_then(Value::as_str)
        .filter(|title| !title.is_empty())
    {
        Some(title) => Placement::Named {
            title: title.to_owned(),
            anchor: values
                .get("anchor")
                .and_then(Value::as_str)
                .and_then(Anchor::from_name)
                .unwrap_or_default(),
        },
        None => Placement::Inline {
            container_id: container_id.to_owned(),
        },
    }
}

fn display_options(
    model: &RemoteModel,
    fallback: &DisplayOptions,
) -> Result<DisplayOptions, SyncError> {
    let Value::Object(mut merged) =
        serde_json::to_value(fallback).map_err(|e| SyncError::Message(e.to_string()))?
    else {
        return Ok(fallback.clone());
    };
    for (key, slot) in &mut merged {
        if let Some(value) = model.get(key).filter(|value| !value.is_null()) {
            slot.clone_from(value);
        }
    }
    let display: DisplayOptions = serde_json::from_value(Value::Object(merged))
        .map_err(|e| ViewerError::InvalidOptions(e.to_string()))?;
    display.validate()?;
    Ok(display)
}

fn decode<T: DeserializeOwned>(model: &RemoteModel, key: &str) -> Option<T> {
    model
        .get(key)
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}

/// Synchronizes one viewer instance with its remote model.
pub struct SyncEngine<V, C> {
    state: SyncState,
    placement: Placement,
    id: InstanceId,
    viewer: V,
    model: RemoteModel,
    channel: C,
    ctx: ViewerContext,
    prefs: SyncPrefs,
    codec: SceneCodec,
    scene: Option<SceneDocument>,
    tracks: Vec<AnimationTrack>,
    control: ControlKind,
    trace: bool,
}

impl<V, C> SyncEngine<V, C>
where
    V: ViewerPort + 'static,
    C: RemoteChannel + 'static,
{
    /// Create an engine for a new viewer and register it in `ctx`.
    ///
    /// Display geometry comes from the initial model, falling back to
    /// `prefs.display`. Inline placements sweep stale inline viewers first
    /// (when enabled); a named placement disposes any live viewer with the
    /// same title. If the initial model already carries a scene it is
    /// rendered immediately; a render failure is logged and leaves the engine
    /// `Uninitialized`.
    pub fn spawn<F>(
        ctx: &ViewerContext,
        placement: Placement,
        initial: Map<String, Value>,
        channel: C,
        prefs: &BridgePrefs,
        make_viewer: F,
    ) -> Result<Rc<RefCell<Self>>, SyncError>
    where
        F: FnOnce(&DisplayOptions) -> V,
    {
        let model = RemoteModel::new(initial, prefs.sync.tolerance);
        let display = display_options(&model, &prefs.display)?;
        match &placement {
            Placement::Inline { .. } if prefs.sync.sweep_inline_on_create => {
                let swept = ctx.sweep_inline();
                if swept > 0 {
                    tracing::debug!(swept, "stale inline viewers disposed");
                }
            }
            Placement::Named { title, .. } => {
                if ctx.dispose_named(title) {
                    tracing::debug!(%title, "named viewer replaced");
                }
            }
            Placement::Inline { .. } => {}
        }

        let trace = prefs.sync.trace_changes || model.flag("js_debug");
        let engine = Rc::new(RefCell::new(Self {
            state: SyncState::Uninitialized,
            placement: placement.clone(),
            id: 0,
            viewer: make_viewer(&display),
            model,
            channel,
            ctx: ctx.clone(),
            prefs: prefs.sync.clone(),
            codec: SceneCodec::new(),
            scene: None,
            tracks: Vec::new(),
            control: ControlKind::default(),
            trace,
        }));
        let shared: SharedViewer = engine.clone();
        let (id, displaced) = ctx.register(&placement, &shared);
        if let Some(displaced) = displaced {
            ctx.dispose(displaced);
        }

        {
            let mut this = engine.borrow_mut();
            this.id = id;
            if let Placement::Named { title, anchor } = &placement {
                ctx.attach(title, anchor);
            }
            if this.model.is_set("shapes") {
                this.state = SyncState::Rendering;
                if let Err(err) = this.render_scene() {
                    tracing::error!(error = %err, "initial render failed");
                    this.state = SyncState::Uninitialized;
                }
            }
        }
        tracing::info!(?placement, id, "viewer instance created");
        Ok(engine)
    }
}

impl<V: ViewerPort, C: RemoteChannel> SyncEngine<V, C> {
    /// Current lifecycle state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Registry id of this instance.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Where this instance lives.
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// The viewer.
    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    /// The viewer, mutably. Changes made here are local interactions and
    /// must be reported with [`SyncEngine::report_local_change`].
    pub fn viewer_mut(&mut self) -> &mut V {
        &mut self.viewer
    }

    /// The remote model mirror.
    pub fn model(&self) -> &RemoteModel {
        &self.model
    }

    /// The outbound channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The outbound channel, mutably.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// The last rendered scene.
    pub fn scene(&self) -> Option<&SceneDocument> {
        self.scene.as_ref()
    }

    /// Loaded animation tracks.
    pub fn tracks(&self) -> &[AnimationTrack] {
        &self.tracks
    }

    fn is_initializing(&self) -> bool {
        matches!(self.state, SyncState::Uninitialized | SyncState::Rendering)
    }

    /// Decode the mirrored scene, render it and report the resulting camera.
    fn render_scene(&mut self) -> Result<(), SyncError> {
        let payload = self.model.get("shapes").cloned().unwrap_or(Value::Null);
        let scene = self.codec.decode_payload(&payload)?;
        let states = self.model.states();
        let render_options: RenderOptions = self.model.options();
        let viewer_options: ViewerOptions = self.model.options();
        self.viewer
            .render(&scene, &states, &render_options, &viewer_options)?;
        self.control = viewer_options.control;
        let parts = scene.part_count();
        self.scene = Some(scene);

        self.sync_reset_location();
        self.capture_camera();
        self.model.flush(&mut self.channel);

        let tracks = self.model.get("tracks").cloned().unwrap_or(Value::Null);
        if let Err(err) = self.load_tracks(&tracks) {
            tracing::error!(error = %err, "animation tracks not loaded");
        }
        self.state = SyncState::Ready;
        tracing::debug!(parts, "scene rendered");
        Ok(())
    }

    fn stored_reset_pose(&self, current: &CameraPose) -> Option<CameraPose> {
        if !self.model.is_set("position0") {
            return None;
        }
        match (
            decode::<Vec3>(&self.model, "position0"),
            decode::<Quat>(&self.model, "quaternion0"),
            decode::<f64>(&self.model, "zoom0"),
        ) {
            (Some(position), Some(quaternion), Some(zoom)) => Some(CameraPose {
                position,
                quaternion,
                target: current.target,
                zoom,
            }),
            _ => {
                tracing::warn!("stored reset location is malformed; recapturing");
                None
            }
        }
    }

    fn sync_reset_location(&mut self) {
        let pose = self.viewer.camera();
        if let Some(reset) = self.stored_reset_pose(&pose) {
            self.viewer.set_reset_location(&reset);
            return;
        }
        self.model.set("position0", json!(pose.position));
        self.model.set("quaternion0", json!(pose.quaternion));
        self.model.set("zoom0", json!(pose.zoom));
    }

    /// Queue the live camera pose; returns how many keys changed.
    fn capture_camera(&mut self) -> usize {
        let mut changed = 0;
        for kind in CAMERA_KINDS {
            let value = PropertyChange::read(kind, &self.viewer).to_value();
            if self.model.set(kind.key(), value) {
                changed += 1;
            }
        }
        changed
    }

    fn report_camera(&mut self) {
        if self.capture_camera() > 0 {
            self.model.flush(&mut self.channel);
        }
    }

    fn load_tracks(&mut self, payload: &Value) -> Result<(), SyncError> {
        let tracks = parse_tracks(payload)?;
        if self.viewer.animation_active() {
            self.viewer.control_animation(AnimationControl::Stop);
        }
        self.viewer.clear_animation();
        self.tracks = tracks;
        for track in &self.tracks {
            self.viewer.add_animation_track(track);
        }
        self.animate();
        Ok(())
    }

    /// Start playback of the loaded tracks at `animation_speed` (default 1).
    ///
    /// No-op without tracks or with a non-positive speed.
    pub fn animate(&mut self) {
        if self.tracks.is_empty() {
            return;
        }
        let speed = self
            .model
            .get("animation_speed")
            .and_then(Value::as_f64)
            .unwrap_or(1.0);
        if speed > 0.0 {
            let duration = tracks_duration(&self.tracks);
            tracing::debug!(duration, speed, tracks = self.tracks.len(), "animation started");
            self.viewer.init_animation(duration, speed);
        }
    }

    fn begin_render(&mut self) {
        self.viewer.clear();
        if self.viewer.animation_active() {
            self.viewer.control_animation(AnimationControl::Stop);
        }
        self.viewer.clear_animation();
        self.scene = None;
        self.tracks.clear();
        self.state = SyncState::Rendering;
    }

    fn finish_render(&mut self) {
        if !(self.model.is_set("shapes") && self.model.is_set("states")) {
            self.state = SyncState::Uninitialized;
            return;
        }
        self.state = SyncState::Rendering;
        if let Err(err) = self.render_scene() {
            tracing::error!(error = %err, "render failed");
            self.state = SyncState::Uninitialized;
        }
    }

    /// Apply one remote property change.
    ///
    /// Never fails: every rejection is logged and reported through the
    /// returned [`ChangeOutcome`].
    pub fn apply_remote_change(&mut self, key: &str, value: &Value) -> ChangeOutcome {
        if self.state == SyncState::Disposed {
            tracing::debug!(key, "change ignored after dispose");
            return ChangeOutcome::Ignored;
        }
        let class = match ModelKey::parse(key, value) {
            Ok(class) => class,
            Err(err) => {
                tracing::error!(error = %err, "remote change rejected");
                return ChangeOutcome::Rejected;
            }
        };
        match class {
            ModelKey::Property(kind) => self.apply_property(key, kind, value),
            ModelKey::Initialize => {
                let Some(start) = value.as_bool() else {
                    tracing::error!(key, %value, "initialize must be a boolean");
                    return ChangeOutcome::Rejected;
                };
                self.model.store(key, value.clone());
                if start {
                    self.begin_render();
                } else {
                    self.finish_render();
                }
                ChangeOutcome::Applied
            }
            ModelKey::Disposed => {
                self.model.store(key, value.clone());
                if value.as_bool() == Some(true) {
                    self.dispose();
                    return ChangeOutcome::Applied;
                }
                ChangeOutcome::Recorded
            }
            ModelKey::Tracks => {
                self.model.store(key, value.clone());
                if self.is_initializing() {
                    return ChangeOutcome::Suppressed;
                }
                match self.load_tracks(value) {
                    Ok(()) => ChangeOutcome::Applied,
                    Err(err) => {
                        tracing::error!(error = %err, "tracks rejected");
                        ChangeOutcome::Rejected
                    }
                }
            }
            ModelKey::JsDebug => {
                self.model.store(key, value.clone());
                self.trace = self.prefs.trace_changes || value.as_bool() == Some(true);
                ChangeOutcome::Recorded
            }
            ModelKey::Result
            | ModelKey::ImageId
            | ModelKey::Shapes
            | ModelKey::States
            | ModelKey::AnimationSpeed
            | ModelKey::Passive(_) => {
                self.model.store(key, value.clone());
                ChangeOutcome::Recorded
            }
        }
    }

    fn apply_property(&mut self, key: &str, kind: PropertyKind, value: &Value) -> ChangeOutcome {
        let change = match PropertyChange::parse(kind, value) {
            Ok(change) => change,
            Err(err) => {
                tracing::error!(key, error = %err, "remote value rejected");
                return ChangeOutcome::Rejected;
            }
        };
        self.model.store(key, value.clone());
        if self.is_initializing() {
            if self.trace {
                tracing::debug!(key, "change deferred to next render");
            }
            return ChangeOutcome::Suppressed;
        }
        let Some(change) = change else {
            return ChangeOutcome::Unchanged;
        };
        if change.matches(&self.viewer, self.model.tolerance()) {
            return ChangeOutcome::Unchanged;
        }
        self.state = SyncState::Updating;
        change.apply(&mut self.viewer);
        if kind.is_camera() {
            self.viewer.update();
        }
        self.state = SyncState::Ready;
        if self.trace {
            tracing::debug!(key, %value, "remote change applied");
        }
        ChangeOutcome::Applied
    }

    /// Report local interaction changes; returns how many keys were written.
    ///
    /// Values tolerantly equal to the mirror are skipped; the rest go out in
    /// one flush. Nothing is reported while rendering or after dispose.
    pub fn report_local_change<I>(&mut self, changes: I) -> usize
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        if matches!(self.state, SyncState::Rendering | SyncState::Disposed) {
            return 0;
        }
        let mut written = 0;
        for (key, value) in changes {
            if ModelKey::classify(&key).is_none() {
                tracing::warn!(%key, "local change for unknown key dropped");
                continue;
            }
            if self.trace {
                tracing::debug!(%key, %value, "local change");
            }
            if self.model.set(&key, value) {
                written += 1;
            }
        }
        if written > 0 {
            self.model.flush(&mut self.channel);
        }
        written
    }

    /// Report a viewer notification of the form `{key: {"new": value}}`.
    pub fn report_notification(&mut self, notification: &Value) -> usize {
        let Some(entries) = notification.as_object() else {
            tracing::warn!("viewer notification is not an object");
            return 0;
        };
        let changes: Vec<(String, Value)> = entries
            .iter()
            .filter_map(|(key, change)| change.get("new").map(|new| (key.clone(), new.clone())))
            .collect();
        self.report_local_change(changes)
    }

    /// Release the viewer, leave the registry and report `disposed`. Idempotent.
    pub fn dispose(&mut self) {
        if self.state == SyncState::Disposed {
            return;
        }
        self.state = SyncState::Disposed;
        self.viewer.dispose();
        self.scene = None;
        self.tracks.clear();
        self.ctx.unregister(&self.placement.key(), self.id);
        if let Placement::Named { title, .. } = &self.placement {
            self.ctx.detach(title);
        }
        self.model.force("disposed", Value::Bool(true));
        self.model.flush(&mut self.channel);
        tracing::info!(placement = ?self.placement, id = self.id, "viewer instance disposed");
    }

    fn capture(&mut self) -> Result<ImageCapture, ViewerError> {
        if self.state == SyncState::Disposed {
            return Err(ViewerError::Disposed);
        }
        self.viewer.snapshot()
    }

    /// Write `{display_id, src, width, height}` to `result`, then dispose.
    pub fn pin_as_png(&mut self) -> Result<(), ViewerError> {
        let capture = self.capture()?;
        let display_id = self.model.get("image_id").cloned().unwrap_or(Value::Null);
        self.model.force(
            "result",
            json!({
                "display_id": display_id,
                "src": capture.src,
                "width": capture.width,
                "height": capture.height,
            }),
        );
        self.model.flush(&mut self.channel);
        self.dispose();
        Ok(())
    }

    /// Write `{filename, src, width, height}` to `result`.
    pub fn save_as_png(&mut self, filename: &str) -> Result<(), ViewerError> {
        let capture = self.capture()?;
        self.model.force(
            "result",
            json!({
                "filename": filename,
                "src": capture.src,
                "width": capture.width,
                "height": capture.height,
            }),
        );
        self.model.flush(&mut self.channel);
        Ok(())
    }

    /// Run a resolved remote method; the value is the call result.
    pub fn call(&mut self, method: RemoteMethod) -> Result<Value, InvokeError> {
        if self.state == SyncState::Disposed {
            return match method {
                RemoteMethod::Dispose => Ok(Value::Null),
                _ => Err(InvokeError::Disposed),
            };
        }
        match method {
            RemoteMethod::Dispose => self.dispose(),
            RemoteMethod::Update => self.viewer.update(),
            RemoteMethod::Animate => self.animate(),
            RemoteMethod::ControlAnimation(control) => self.viewer.control_animation(control),
            RemoteMethod::PinAsPng => self.pin_as_png()?,
            RemoteMethod::SaveAsPng(filename) => self.save_as_png(&filename)?,
            RemoteMethod::ExportImage => {
                let capture = self.capture()?;
                return Ok(serde_json::to_value(capture)
                    .unwrap_or_else(|_| Value::String(UNSERIALIZABLE.to_owned())));
            }
            RemoteMethod::PresetCamera(preset) => {
                self.viewer.preset_camera(preset);
                self.viewer.update();
                self.report_camera();
            }
            RemoteMethod::Rotate { axis, degrees } => {
                let required = axis.required_control();
                if required != self.control {
                    return Err(InvokeError::WrongControl {
                        required,
                        actual: self.control,
                    });
                }
                self.viewer.rotate(axis, degrees)?;
                self.viewer.update();
                self.report_camera();
            }
            RemoteMethod::SetCameraPose(pose) => {
                if let Some(position) = pose.position {
                    self.viewer.set_camera_position(position);
                }
                if let Some(quaternion) = pose.quaternion {
                    self.viewer.set_camera_quaternion(quaternion);
                }
                if let Some(target) = pose.target {
                    self.viewer.set_camera_target(target);
                }
                if let Some(zoom) = pose.zoom {
                    self.viewer.set_camera_zoom(zoom);
                }
                self.viewer.update();
                self.report_camera();
            }
        }
        Ok(Value::Null)
    }

    /// Handle a method-call message. A call with an id gets exactly one reply.
    pub fn invoke(&mut self, call: &MethodCall) {
        let outcome = MethodRequest::parse(call)
            .and_then(|request| request.resolve())
            .and_then(|method| self.call(method));
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(method = %call.method, error = %err, "remote method failed");
                json!({ "error": err.to_string() })
            }
        };
        if let Some(id) = call.id {
            self.channel.send(OutboundMessage::MethodResult { id, result });
        }
    }

    /// Dispatch one inbound message.
    pub fn handle(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::Update { changes } => {
                for (key, value) in &changes {
                    self.apply_remote_change(key, value);
                }
            }
            InboundMessage::Method(call) => self.invoke(&call),
        }
    }
}

impl<V: ViewerPort, C: RemoteChannel> ManagedViewer for SyncEngine<V, C> {
    fn dispose(&mut self) {
        SyncEngine::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        self.state == SyncState::Disposed
    }
}

impl<V: ViewerPort, C: RemoteChannel> InboundHandler for SyncEngine<V, C> {
    fn handle(&mut self, message: InboundMessage) {
        SyncEngine::handle(self, message);
    }

    fn is_closed(&self) -> bool {
        self.state == SyncState::Disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn title_selects_named_placement() {
        assert_eq!(
            placement_for(&map(json!({"title": "Parts", "anchor": "split-left"})), "cell-1"),
            Placement::Named {
                title: "Parts".into(),
                anchor: Anchor::Main("split-left".into()),
            }
        );
        assert_eq!(
            placement_for(&map(json!({"title": ""})), "cell-1"),
            Placement::Inline {
                container_id: "cell-1".into()
            }
        );
    }

    #[test]
    fn display_geometry_prefers_model_values() {
        let model = RemoteModel::new(map(json!({"cad_width": 1024, "height": null})), 1e-9);
        let display = display_options(&model, &DisplayOptions::default()).unwrap();
        assert_eq!(display.cad_width, 1024);
        assert_eq!(display.height, DisplayOptions::default().height);

        let narrow = RemoteModel::new(map(json!({"cad_width": 100})), 1e-9);
        assert!(matches!(
            display_options(&narrow, &DisplayOptions::default()),
            Err(SyncError::Viewer(ViewerError::InvalidOptions(_)))
        ));
    }
}
