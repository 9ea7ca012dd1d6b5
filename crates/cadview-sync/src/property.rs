// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Closed set of viewer-owned properties and their typed changes.
//!
//! Every synchronized key maps to a [`PropertyKind`]; a value for that key is
//! parsed into a [`PropertyChange`] which knows how to read the current viewer
//! value, compare against it tolerantly, and apply itself silently.

use cadview_port::{
    Anchor, ClipPlane, ControlKind, Quat, States, Tab, Theme, Vec3, ViewFlag, ViewScalar,
    ViewerPort, Visibility,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tolerance::slices_tol_equal;
use crate::SyncError;

/// A synchronized viewer property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Camera position.
    Position,
    /// Camera orientation.
    Quaternion,
    /// Camera look-at target.
    Target,
    /// Camera zoom.
    Zoom,
    /// A boolean toggle.
    Flag(ViewFlag),
    /// A scalar setting.
    Scalar(ViewScalar),
    /// Grid visibility triple.
    Grid,
    /// Tree collapse level.
    Collapse,
    /// Default edge color.
    EdgeColor,
    /// Normal of one clipping plane.
    ClipNormal(ClipPlane),
    /// Slider of one clipping plane.
    ClipSlider(ClipPlane),
    /// Active side panel tab.
    Tab,
    /// Partial visibility updates merged into the current states.
    StateUpdates,
}

impl PropertyKind {
    /// Every synchronized property.
    pub fn all() -> impl Iterator<Item = PropertyKind> {
        [
            PropertyKind::Position,
            PropertyKind::Quaternion,
            PropertyKind::Target,
            PropertyKind::Zoom,
            PropertyKind::Grid,
            PropertyKind::Collapse,
            PropertyKind::EdgeColor,
            PropertyKind::Tab,
            PropertyKind::StateUpdates,
        ]
        .into_iter()
        .chain(ViewFlag::ALL.into_iter().map(PropertyKind::Flag))
        .chain(ViewScalar::ALL.into_iter().map(PropertyKind::Scalar))
        .chain(ClipPlane::ALL.into_iter().map(PropertyKind::ClipNormal))
        .chain(ClipPlane::ALL.into_iter().map(PropertyKind::ClipSlider))
    }

    /// Remote model key.
    pub fn key(self) -> &'static str {
        match self {
            PropertyKind::Position => "position",
            PropertyKind::Quaternion => "quaternion",
            PropertyKind::Target => "target",
            PropertyKind::Zoom => "zoom",
            PropertyKind::Flag(flag) => flag.key(),
            PropertyKind::Scalar(scalar) => scalar.key(),
            PropertyKind::Grid => "grid",
            PropertyKind::Collapse => "collapse",
            PropertyKind::EdgeColor => "default_edgecolor",
            PropertyKind::ClipNormal(plane) => plane.normal_key(),
            PropertyKind::ClipSlider(plane) => plane.slider_key(),
            PropertyKind::Tab => "tab",
            PropertyKind::StateUpdates => "state_updates",
        }
    }

    /// Look up a property by remote key. `default_edge_color` is accepted as an alias.
    pub fn from_key(key: &str) -> Option<Self> {
        if key == "default_edge_color" {
            return Some(PropertyKind::EdgeColor);
        }
        Self::all().find(|kind| kind.key() == key)
    }

    /// Whether the viewer reports this property back after a render.
    pub fn is_camera(self) -> bool {
        matches!(
            self,
            PropertyKind::Position
                | PropertyKind::Quaternion
                | PropertyKind::Target
                | PropertyKind::Zoom
        )
    }
}

/// A typed value for one [`PropertyKind`].
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyChange {
    /// Camera position.
    Position(Vec3),
    /// Camera orientation.
    Quaternion(Quat),
    /// Camera target.
    Target(Vec3),
    /// Camera zoom.
    Zoom(f64),
    /// Toggle value.
    Flag(ViewFlag, bool),
    /// Scalar value.
    Scalar(ViewScalar, f64),
    /// Grid visibility.
    Grid([bool; 3]),
    /// Collapse level.
    Collapse(u32),
    /// Edge color.
    EdgeColor(String),
    /// Clipping plane normal.
    ClipNormal(ClipPlane, Vec3),
    /// Clipping plane slider.
    ClipSlider(ClipPlane, f64),
    /// Tab selection.
    Tab(Tab),
    /// Visibility updates.
    StateUpdates(States),
}

fn invalid(kind: PropertyKind, expected: &'static str) -> SyncError {
    SyncError::InvalidValue {
        key: kind.key().to_owned(),
        expected,
    }
}

fn numbers<const N: usize>(value: &Value) -> Option<[f64; N]> {
    let items = value.as_array()?;
    if items.len() != N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item.as_f64()?;
    }
    Some(out)
}

fn visibility(value: &Value) -> Option<Visibility> {
    let items = value.as_array()?;
    let bit = |item: &Value| {
        item.as_u64()
            .filter(|b| matches!(b, 0 | 1 | 3))
            .and_then(|b| u8::try_from(b).ok())
    };
    match items.as_slice() {
        [shape, edges] => Some([bit(shape)?, bit(edges)?]),
        _ => None,
    }
}

impl PropertyChange {
    /// Parse a remote value for `kind`. `null` means "unset" and yields `None`.
    pub fn parse(kind: PropertyKind, value: &Value) -> Result<Option<Self>, SyncError> {
        if value.is_null() {
            return Ok(None);
        }
        let change = match kind {
            PropertyKind::Position => {
                Self::Position(numbers(value).ok_or_else(|| invalid(kind, "3-vector"))?)
            }
            PropertyKind::Quaternion => {
                Self::Quaternion(numbers(value).ok_or_else(|| invalid(kind, "quaternion"))?)
            }
            PropertyKind::Target => {
                Self::Target(numbers(value).ok_or_else(|| invalid(kind, "3-vector"))?)
            }
            PropertyKind::Zoom => {
                Self::Zoom(value.as_f64().ok_or_else(|| invalid(kind, "number"))?)
            }
            PropertyKind::Flag(flag) => {
                Self::Flag(flag, value.as_bool().ok_or_else(|| invalid(kind, "boolean"))?)
            }
            PropertyKind::Scalar(scalar) => {
                Self::Scalar(scalar, value.as_f64().ok_or_else(|| invalid(kind, "number"))?)
            }
            PropertyKind::Grid => {
                let items = value
                    .as_array()
                    .filter(|items| items.len() == 3)
                    .ok_or_else(|| invalid(kind, "3 booleans"))?;
                let mut grid = [false; 3];
                for (slot, item) in grid.iter_mut().zip(items) {
                    *slot = item.as_bool().ok_or_else(|| invalid(kind, "3 booleans"))?;
                }
                Self::Grid(grid)
            }
            PropertyKind::Collapse => Self::Collapse(
                value
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| invalid(kind, "non-negative integer"))?,
            ),
            PropertyKind::EdgeColor => Self::EdgeColor(
                value
                    .as_str()
                    .ok_or_else(|| invalid(kind, "web color string"))?
                    .to_owned(),
            ),
            PropertyKind::ClipNormal(plane) => {
                Self::ClipNormal(plane, numbers(value).ok_or_else(|| invalid(kind, "3-vector"))?)
            }
            PropertyKind::ClipSlider(plane) => {
                Self::ClipSlider(plane, value.as_f64().ok_or_else(|| invalid(kind, "number"))?)
            }
            PropertyKind::Tab => Self::Tab(
                value
                    .as_str()
                    .and_then(Tab::from_name)
                    .ok_or_else(|| invalid(kind, "\"tree\" or \"clip\""))?,
            ),
            PropertyKind::StateUpdates => {
                let map = value
                    .as_object()
                    .ok_or_else(|| invalid(kind, "object of visibility pairs"))?;
                let mut states = States::new();
                for (path, pair) in map {
                    let vis =
                        visibility(pair).ok_or_else(|| invalid(kind, "visibility pairs of 0, 1 or 3"))?;
                    states.insert(path.clone(), vis);
                }
                Self::StateUpdates(states)
            }
        };
        Ok(Some(change))
    }

    /// The current viewer value of `kind`.
    pub fn read<V: ViewerPort + ?Sized>(kind: PropertyKind, viewer: &V) -> Self {
        match kind {
            PropertyKind::Position => Self::Position(viewer.camera().position),
            PropertyKind::Quaternion => Self::Quaternion(viewer.camera().quaternion),
            PropertyKind::Target => Self::Target(viewer.camera().target),
            PropertyKind::Zoom => Self::Zoom(viewer.camera().zoom),
            PropertyKind::Flag(flag) => Self::Flag(flag, viewer.flag(flag)),
            PropertyKind::Scalar(scalar) => Self::Scalar(scalar, viewer.scalar(scalar)),
            PropertyKind::Grid => Self::Grid(viewer.grid()),
            PropertyKind::Collapse => Self::Collapse(viewer.collapse()),
            PropertyKind::EdgeColor => Self::EdgeColor(viewer.edge_color()),
            PropertyKind::ClipNormal(plane) => Self::ClipNormal(plane, viewer.clip_normal(plane)),
            PropertyKind::ClipSlider(plane) => Self::ClipSlider(plane, viewer.clip_slider(plane)),
            PropertyKind::Tab => Self::Tab(viewer.active_tab()),
            PropertyKind::StateUpdates => Self::StateUpdates(viewer.states()),
        }
    }

    /// The property this change targets.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Position(_) => PropertyKind::Position,
            Self::Quaternion(_) => PropertyKind::Quaternion,
            Self::Target(_) => PropertyKind::Target,
            Self::Zoom(_) => PropertyKind::Zoom,
            Self::Flag(flag, _) => PropertyKind::Flag(*flag),
            Self::Scalar(scalar, _) => PropertyKind::Scalar(*scalar),
            Self::Grid(_) => PropertyKind::Grid,
            Self::Collapse(_) => PropertyKind::Collapse,
            Self::EdgeColor(_) => PropertyKind::EdgeColor,
            Self::ClipNormal(plane, _) => PropertyKind::ClipNormal(*plane),
            Self::ClipSlider(plane, _) => PropertyKind::ClipSlider(*plane),
            Self::Tab(_) => PropertyKind::Tab,
            Self::StateUpdates(_) => PropertyKind::StateUpdates,
        }
    }

    /// Whether two changes for the same property agree within `tol`.
    pub fn tol_eq(&self, other: &Self, tol: f64) -> bool {
        match (self, other) {
            (Self::Position(a), Self::Position(b))
            | (Self::Target(a), Self::Target(b))
            | (Self::ClipNormal(_, a), Self::ClipNormal(_, b)) => {
                self.kind() == other.kind() && slices_tol_equal(a, b, tol)
            }
            (Self::Quaternion(a), Self::Quaternion(b)) => slices_tol_equal(a, b, tol),
            (Self::Zoom(a), Self::Zoom(b))
            | (Self::Scalar(_, a), Self::Scalar(_, b))
            | (Self::ClipSlider(_, a), Self::ClipSlider(_, b)) => {
                self.kind() == other.kind() && (a - b).abs() < tol
            }
            _ => self == other,
        }
    }

    /// Whether the viewer already holds this value.
    ///
    /// Visibility updates match when every updated path already has the
    /// requested pair.
    pub fn matches<V: ViewerPort + ?Sized>(&self, viewer: &V, tol: f64) -> bool {
        if let Self::StateUpdates(updates) = self {
            let current = viewer.states();
            return updates
                .iter()
                .all(|(path, vis)| current.get(path) == Some(vis));
        }
        self.tol_eq(&Self::read(self.kind(), viewer), tol)
    }

    /// Apply through the silent viewer setters.
    pub fn apply<V: ViewerPort + ?Sized>(&self, viewer: &mut V) {
        match self {
            Self::Position(v) => viewer.set_camera_position(*v),
            Self::Quaternion(q) => viewer.set_camera_quaternion(*q),
            Self::Target(v) => viewer.set_camera_target(*v),
            Self::Zoom(z) => viewer.set_camera_zoom(*z),
            Self::Flag(flag, on) => viewer.set_flag(*flag, *on),
            Self::Scalar(scalar, v) => viewer.set_scalar(*scalar, *v),
            Self::Grid(grid) => viewer.set_grid(*grid),
            Self::Collapse(level) => viewer.set_collapse(*level),
            Self::EdgeColor(color) => viewer.set_edge_color(color),
            Self::ClipNormal(plane, normal) => viewer.set_clip_normal(*plane, *normal),
            Self::ClipSlider(plane, v) => viewer.set_clip_slider(*plane, *v),
            Self::Tab(tab) => viewer.select_tab(*tab),
            Self::StateUpdates(states) => viewer.set_states(states),
        }
    }

    /// Remote representation.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Position(v) | Self::Target(v) | Self::ClipNormal(_, v) => json!(v),
            Self::Quaternion(q) => json!(q),
            Self::Zoom(v) | Self::Scalar(_, v) | Self::ClipSlider(_, v) => json!(v),
            Self::Flag(_, on) => json!(on),
            Self::Grid(grid) => json!(grid),
            Self::Collapse(level) => json!(level),
            Self::EdgeColor(color) => json!(color),
            Self::Tab(tab) => json!(tab.as_str()),
            Self::StateUpdates(states) => json!(states),
        }
    }
}

/// How the engine treats a remote model key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKey {
    /// A synchronized viewer property.
    Property(PropertyKind),
    /// Render handshake flag.
    Initialize,
    /// Terminal disposal flag.
    Disposed,
    /// Export result slot (written locally, ignored inbound).
    Result,
    /// Display id used by "pin as png".
    ImageId,
    /// Scene payload.
    Shapes,
    /// Full visibility states sent with a scene.
    States,
    /// Animation track payload.
    Tracks,
    /// Playback speed of animation tracks.
    AnimationSpeed,
    /// Debug logging switch.
    JsDebug,
    /// Stored in the mirror and read at render time only.
    Passive(&'static str),
}

const PASSIVE_KEYS: &[&str] = &[
    "title",
    "anchor",
    "cad_width",
    "height",
    "tree_width",
    "theme",
    "pinning",
    "control",
    "ticks",
    "normal_len",
    "timeit",
    "position0",
    "quaternion0",
    "zoom0",
    "last_pick",
    "lastPick",
    "rendered",
];

impl ModelKey {
    /// Classify a remote key; `None` for keys outside the allow-list.
    pub fn classify(key: &str) -> Option<Self> {
        Some(match key {
            "initialize" => ModelKey::Initialize,
            "disposed" => ModelKey::Disposed,
            "result" => ModelKey::Result,
            "image_id" => ModelKey::ImageId,
            "shapes" => ModelKey::Shapes,
            "states" => ModelKey::States,
            "tracks" => ModelKey::Tracks,
            "animation_speed" => ModelKey::AnimationSpeed,
            "js_debug" => ModelKey::JsDebug,
            other => match PropertyKind::from_key(other) {
                Some(kind) => ModelKey::Property(kind),
                None => ModelKey::Passive(PASSIVE_KEYS.iter().copied().find(|k| *k == other)?),
            },
        })
    }

    /// Classify `key` and check `value` against the key's domain.
    ///
    /// `null` always passes. Viewer property values are checked later by
    /// [`PropertyChange::parse`], track payloads by the track decoder.
    pub fn parse(key: &str, value: &Value) -> Result<Self, SyncError> {
        let class = Self::classify(key).ok_or_else(|| SyncError::UnknownProperty(key.to_owned()))?;
        if value.is_null() {
            return Ok(class);
        }
        match class.violation(value) {
            Some(expected) => Err(SyncError::InvalidValue {
                key: key.to_owned(),
                expected,
            }),
            None => Ok(class),
        }
    }

    /// Description of the accepted domain when `value` falls outside it.
    fn violation(self, value: &Value) -> Option<&'static str> {
        let (ok, expected) = match self {
            ModelKey::Property(_) | ModelKey::Result | ModelKey::Shapes | ModelKey::Tracks => {
                return None
            }
            ModelKey::Initialize | ModelKey::Disposed | ModelKey::JsDebug => {
                (value.is_boolean(), "boolean")
            }
            ModelKey::ImageId => (value.is_string(), "string"),
            ModelKey::States => (
                value
                    .as_object()
                    .is_some_and(|map| map.values().all(|pair| visibility(pair).is_some())),
                "object of visibility pairs",
            ),
            ModelKey::AnimationSpeed => (value.is_number(), "number"),
            ModelKey::Passive(key) => match key {
                "title" => (value.is_string(), "string"),
                "anchor" => (
                    value.as_str().and_then(Anchor::from_name).is_some(),
                    "\"right\" or a shell insert mode",
                ),
                "cad_width" | "height" | "tree_width" | "ticks" => (
                    value.as_u64().is_some_and(|n| u32::try_from(n).is_ok()),
                    "non-negative integer",
                ),
                "theme" => (
                    Theme::deserialize(value).is_ok(),
                    "\"light\", \"dark\" or \"browser\"",
                ),
                "control" => (
                    ControlKind::deserialize(value).is_ok(),
                    "\"trackball\" or \"orbit\"",
                ),
                "pinning" | "timeit" | "rendered" => (value.is_boolean(), "boolean"),
                "normal_len" => (
                    value.as_f64().is_some_and(|n| n >= 0.0),
                    "non-negative number",
                ),
                "zoom0" => (value.is_number(), "number"),
                "position0" => (numbers::<3>(value).is_some(), "3-vector"),
                "quaternion0" => (numbers::<4>(value).is_some(), "quaternion"),
                _ => return None,
            },
        };
        (!ok).then_some(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadview_codec::MockViewer;

    #[test]
    fn every_key_round_trips() {
        let kinds: Vec<_> = PropertyKind::all().collect();
        assert_eq!(kinds.len(), 9 + 9 + 8 + 3 + 3);
        for kind in kinds {
            assert_eq!(PropertyKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(
            PropertyKind::from_key("default_edge_color"),
            Some(PropertyKind::EdgeColor)
        );
    }

    #[test]
    fn unknown_tab_is_rejected_not_coerced() {
        assert_eq!(
            PropertyChange::parse(PropertyKind::Tab, &json!("Clip")),
            Err(SyncError::InvalidValue {
                key: "tab".into(),
                expected: "\"tree\" or \"clip\""
            })
        );
        assert_eq!(
            PropertyChange::parse(PropertyKind::Tab, &json!("clip")),
            Ok(Some(PropertyChange::Tab(Tab::Clip)))
        );
    }

    #[test]
    fn mirror_only_keys_are_checked_against_their_domain() {
        assert_eq!(
            ModelKey::parse("control", &json!("orbit")),
            Ok(ModelKey::Passive("control"))
        );
        assert_eq!(
            ModelKey::parse("control", &json!("bogus")),
            Err(SyncError::InvalidValue {
                key: "control".into(),
                expected: "\"trackball\" or \"orbit\""
            })
        );
        assert!(ModelKey::parse("ticks", &json!(-5)).is_err());
        assert!(ModelKey::parse("theme", &json!("neon")).is_err());
        assert!(ModelKey::parse("anchor", &json!("left")).is_err());
        assert!(ModelKey::parse("position0", &json!([1.0, 2.0])).is_err());
        assert!(ModelKey::parse("states", &json!({"/a": [1, 2]})).is_err());
        assert!(ModelKey::parse("anchor", &json!("split-right")).is_ok());
        assert!(ModelKey::parse("ticks", &Value::Null).is_ok());
        assert!(ModelKey::parse("last_pick", &json!({"path": "/a"})).is_ok());
        assert_eq!(
            ModelKey::parse("bb_factor", &json!(1.0)),
            Err(SyncError::UnknownProperty("bb_factor".into()))
        );
    }

    #[test]
    fn null_is_unset() {
        assert_eq!(
            PropertyChange::parse(PropertyKind::Position, &Value::Null),
            Ok(None)
        );
    }

    #[test]
    fn matches_uses_tolerance() {
        let mut viewer = MockViewer::new();
        viewer.camera.position = [1.0, 2.0, 3.0];
        let near = PropertyChange::Position([1.0 + 1e-12, 2.0, 3.0]);
        let far = PropertyChange::Position([1.1, 2.0, 3.0]);
        assert!(near.matches(&viewer, 1e-9));
        assert!(!far.matches(&viewer, 1e-9));
    }

    #[test]
    fn apply_then_read_agree() {
        let mut viewer = MockViewer::new();
        let change = PropertyChange::ClipNormal(ClipPlane::P1, [0.0, 0.0, 1.0]);
        change.apply(&mut viewer);
        assert_eq!(
            PropertyChange::read(PropertyKind::ClipNormal(ClipPlane::P1), &viewer),
            change
        );
        assert_eq!(change.to_value(), json!([0.0, 0.0, 1.0]));
    }

    #[test]
    fn state_updates_match_as_subset() {
        let mut viewer = MockViewer::new();
        viewer.states.insert("/a".into(), [1, 1]);
        viewer.states.insert("/b".into(), [1, 0]);
        let update = PropertyChange::parse(PropertyKind::StateUpdates, &json!({"/b": [1, 0]}))
            .unwrap()
            .unwrap();
        assert!(update.matches(&viewer, 1e-9));
        assert!(PropertyChange::parse(PropertyKind::StateUpdates, &json!({"/b": [2, 0]})).is_err());
    }

    #[test]
    fn classify_allow_list() {
        assert_eq!(
            ModelKey::classify("clip_slider_2"),
            Some(ModelKey::Property(PropertyKind::ClipSlider(ClipPlane::P2)))
        );
        assert_eq!(ModelKey::classify("ticks"), Some(ModelKey::Passive("ticks")));
        assert_eq!(ModelKey::classify("initialize"), Some(ModelKey::Initialize));
        assert_eq!(ModelKey::classify("bb_factor"), None);
    }
}
