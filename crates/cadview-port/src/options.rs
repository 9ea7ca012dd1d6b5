// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed viewer settings: toggles, scalars, clipping, tabs and option bundles.
//!
//! Option bundles deserialize from the remote model's flat property map, so
//! their field names are the wire keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::camera::{ControlKind, Quat, Vec3};
use crate::ViewerError;

/// Boolean viewer toggles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewFlag {
    /// Show coordinate axes.
    Axes,
    /// Center axes at the origin instead of the scene center.
    Axes0,
    /// Orthographic instead of perspective projection.
    Ortho,
    /// Render shapes transparently.
    Transparent,
    /// Draw edges in black.
    BlackEdges,
    /// Show the CAD tool bar.
    Tools,
    /// Exploded assembly view.
    Explode,
    /// Intersect instead of union the clipping planes.
    ClipIntersection,
    /// Show colored clipping plane helpers.
    ClipPlanes,
}

impl ViewFlag {
    /// Every toggle, in wire-key order.
    pub const ALL: [ViewFlag; 9] = [
        ViewFlag::Axes,
        ViewFlag::Axes0,
        ViewFlag::Ortho,
        ViewFlag::Transparent,
        ViewFlag::BlackEdges,
        ViewFlag::Tools,
        ViewFlag::Explode,
        ViewFlag::ClipIntersection,
        ViewFlag::ClipPlanes,
    ];

    /// Remote property key.
    pub fn key(self) -> &'static str {
        match self {
            ViewFlag::Axes => "axes",
            ViewFlag::Axes0 => "axes0",
            ViewFlag::Ortho => "ortho",
            ViewFlag::Transparent => "transparent",
            ViewFlag::BlackEdges => "black_edges",
            ViewFlag::Tools => "tools",
            ViewFlag::Explode => "explode",
            ViewFlag::ClipIntersection => "clip_intersection",
            ViewFlag::ClipPlanes => "clip_planes",
        }
    }
}

/// Scalar lighting, material and control-speed settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewScalar {
    /// Ambient light intensity.
    AmbientIntensity,
    /// Intensity of the directional lights.
    DirectIntensity,
    /// Material metalness.
    Metalness,
    /// Material roughness.
    Roughness,
    /// Opacity used when transparency is on.
    DefaultOpacity,
    /// Mouse-wheel zoom speed.
    ZoomSpeed,
    /// Pan speed.
    PanSpeed,
    /// Rotate speed.
    RotateSpeed,
}

impl ViewScalar {
    /// Every scalar, in wire-key order.
    pub const ALL: [ViewScalar; 8] = [
        ViewScalar::AmbientIntensity,
        ViewScalar::DirectIntensity,
        ViewScalar::Metalness,
        ViewScalar::Roughness,
        ViewScalar::DefaultOpacity,
        ViewScalar::ZoomSpeed,
        ViewScalar::PanSpeed,
        ViewScalar::RotateSpeed,
    ];

    /// Remote property key.
    pub fn key(self) -> &'static str {
        match self {
            ViewScalar::AmbientIntensity => "ambient_intensity",
            ViewScalar::DirectIntensity => "direct_intensity",
            ViewScalar::Metalness => "metalness",
            ViewScalar::Roughness => "roughness",
            ViewScalar::DefaultOpacity => "default_opacity",
            ViewScalar::ZoomSpeed => "zoom_speed",
            ViewScalar::PanSpeed => "pan_speed",
            ViewScalar::RotateSpeed => "rotate_speed",
        }
    }
}

/// One of the three clipping planes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ClipPlane {
    /// First plane (x by default).
    P0 = 0,
    /// Second plane (y by default).
    P1 = 1,
    /// Third plane (z by default).
    P2 = 2,
}

impl ClipPlane {
    /// All planes in index order.
    pub const ALL: [ClipPlane; 3] = [ClipPlane::P0, ClipPlane::P1, ClipPlane::P2];

    /// Zero-based plane index.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Remote key of the plane normal.
    pub fn normal_key(self) -> &'static str {
        match self {
            ClipPlane::P0 => "clip_normal_0",
            ClipPlane::P1 => "clip_normal_1",
            ClipPlane::P2 => "clip_normal_2",
        }
    }

    /// Remote key of the plane slider.
    pub fn slider_key(self) -> &'static str {
        match self {
            ClipPlane::P0 => "clip_slider_0",
            ClipPlane::P1 => "clip_slider_1",
            ClipPlane::P2 => "clip_slider_2",
        }
    }
}

/// Side panel tabs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    /// Navigation tree.
    #[default]
    Tree,
    /// Clipping controls.
    Clip,
}

impl Tab {
    /// Parse a tab name. Unknown names are rejected, never coerced.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tree" => Some(Tab::Tree),
            "clip" => Some(Tab::Clip),
            _ => None,
        }
    }

    /// Wire name of the tab.
    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Tree => "tree",
            Tab::Clip => "clip",
        }
    }
}

/// Visibility pair `[shape, edges]`: 0 hidden, 1 visible, 3 not applicable.
pub type Visibility = [u8; 2];

/// Visibility per object path (e.g. `/assembly/part_1`).
pub type States = BTreeMap<String, Visibility>;

/// UI theme.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    #[default]
    Light,
    /// Dark theme.
    Dark,
    /// Follow the host.
    Browser,
}

/// Geometry of the viewer surface, fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Canvas width in pixels.
    pub cad_width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Navigation tree width in pixels.
    pub tree_width: u32,
    /// UI theme.
    pub theme: Theme,
    /// Whether the "pin as png" button is shown.
    pub pinning: bool,
}

impl DisplayOptions {
    /// Smallest supported canvas width.
    pub const MIN_CAD_WIDTH: u32 = 640;
    /// Smallest supported tree width.
    pub const MIN_TREE_WIDTH: u32 = 240;

    /// Reject geometries the viewer layout cannot hold.
    pub fn validate(&self) -> Result<(), ViewerError> {
        if self.cad_width < Self::MIN_CAD_WIDTH {
            return Err(ViewerError::InvalidOptions(format!(
                "cad_width must be >= {}, got {}",
                Self::MIN_CAD_WIDTH,
                self.cad_width
            )));
        }
        if self.tree_width < Self::MIN_TREE_WIDTH {
            return Err(ViewerError::InvalidOptions(format!(
                "tree_width must be >= {}, got {}",
                Self::MIN_TREE_WIDTH,
                self.tree_width
            )));
        }
        Ok(())
    }
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            cad_width: 800,
            height: 600,
            tree_width: 240,
            theme: Theme::Light,
            pinning: false,
        }
    }
}

/// Tessellation rendering options, consumed once per render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Length of rendered vertex normals; 0 disables them.
    pub normal_len: f64,
    /// Default edge color in web format.
    #[serde(alias = "default_edge_color")]
    pub default_edgecolor: String,
    /// Opacity used when transparency is on.
    pub default_opacity: f64,
    /// Ambient light intensity.
    pub ambient_intensity: f64,
    /// Directional light intensity.
    pub direct_intensity: f64,
    /// Material metalness.
    pub metalness: f64,
    /// Material roughness.
    pub roughness: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            normal_len: 0.0,
            default_edgecolor: "#707070".to_owned(),
            default_opacity: 0.5,
            ambient_intensity: 0.5,
            direct_intensity: 0.3,
            metalness: 0.3,
            roughness: 0.65,
        }
    }
}

/// Viewer options, consumed once per render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerOptions {
    /// Camera control model.
    pub control: ControlKind,
    /// Show the tool bar.
    pub tools: bool,
    /// Show axes.
    pub axes: bool,
    /// Center axes at the origin.
    pub axes0: bool,
    /// Grids for the `xy`, `xz`, `yz` planes.
    pub grid: [bool; 3],
    /// Orthographic projection.
    pub ortho: bool,
    /// Tick hint for grids.
    pub ticks: u32,
    /// Transparent shapes.
    pub transparent: bool,
    /// Black edges.
    pub black_edges: bool,
    /// Exploded view.
    pub explode: bool,
    /// Tree collapse level.
    pub collapse: u32,
    /// Emit timing diagnostics.
    pub timeit: bool,
    /// Zoom speed.
    pub zoom_speed: f64,
    /// Pan speed.
    pub pan_speed: f64,
    /// Rotate speed.
    pub rotate_speed: f64,
    /// Initial camera position, if dictated by the remote side.
    pub position: Option<Vec3>,
    /// Initial camera orientation.
    pub quaternion: Option<Quat>,
    /// Initial look-at target.
    pub target: Option<Vec3>,
    /// Initial zoom.
    pub zoom: Option<f64>,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            control: ControlKind::Trackball,
            tools: true,
            axes: false,
            axes0: false,
            grid: [false; 3],
            ortho: true,
            ticks: 10,
            transparent: false,
            black_edges: false,
            explode: false,
            collapse: 0,
            timeit: false,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            rotate_speed: 1.0,
            position: None,
            quaternion: None,
            target: None,
            zoom: None,
        }
    }
}

impl ViewerOptions {
    /// The value of a toggle as requested by these options.
    pub fn flag(&self, flag: ViewFlag) -> bool {
        match flag {
            ViewFlag::Axes => self.axes,
            ViewFlag::Axes0 => self.axes0,
            ViewFlag::Ortho => self.ortho,
            ViewFlag::Transparent => self.transparent,
            ViewFlag::BlackEdges => self.black_edges,
            ViewFlag::Tools => self.tools,
            ViewFlag::Explode => self.explode,
            ViewFlag::ClipIntersection | ViewFlag::ClipPlanes => false,
        }
    }
}

/// Canvas capture produced by a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCapture {
    /// `data:image/png;base64,...` URI.
    pub src: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Playback commands for animation tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationControl {
    /// Start or resume.
    Play,
    /// Stop and rewind.
    Stop,
    /// Toggle pause.
    Pause,
}

impl AnimationControl {
    /// Parse the wire command name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "play" => Some(AnimationControl::Play),
            "stop" => Some(AnimationControl::Stop),
            "pause" => Some(AnimationControl::Pause),
            _ => None,
        }
    }
}
