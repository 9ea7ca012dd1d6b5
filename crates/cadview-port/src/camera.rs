// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Camera pose and control types.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// World-space 3-vector `[x, y, z]`.
pub type Vec3 = [f64; 3];

/// Rotation quaternion `[x, y, z, w]`.
pub type Quat = [f64; 4];

/// Transient camera state of a viewer instance.
///
/// This is the part of the viewer that is mirrored to the remote model
/// after every (re)initialization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Camera position in world space.
    pub position: Vec3,
    /// Camera orientation.
    pub quaternion: Quat,
    /// Look-at target in world space.
    pub target: Vec3,
    /// Zoom factor (1.0 = fit).
    pub zoom: f64,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: [1.0, 1.0, 1.0],
            quaternion: [0.0, 0.0, 0.0, 1.0],
            target: [0.0, 0.0, 0.0],
            zoom: 1.0,
        }
    }
}

/// Predefined camera directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraPreset {
    /// Isometric view.
    Iso,
    /// Looking down the z-axis.
    Top,
    /// Looking up the z-axis.
    Bottom,
    /// Looking along +x.
    Left,
    /// Looking along -x.
    Right,
    /// Looking along +y.
    Front,
    /// Looking along -y.
    Rear,
}

impl CameraPreset {
    /// Wire name of the preset.
    pub fn as_str(self) -> &'static str {
        match self {
            CameraPreset::Iso => "iso",
            CameraPreset::Top => "top",
            CameraPreset::Bottom => "bottom",
            CameraPreset::Left => "left",
            CameraPreset::Right => "right",
            CameraPreset::Front => "front",
            CameraPreset::Rear => "rear",
        }
    }
}

impl FromStr for CameraPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "iso" => Ok(CameraPreset::Iso),
            "top" => Ok(CameraPreset::Top),
            "bottom" => Ok(CameraPreset::Bottom),
            "left" => Ok(CameraPreset::Left),
            "right" => Ok(CameraPreset::Right),
            "front" => Ok(CameraPreset::Front),
            "rear" => Ok(CameraPreset::Rear),
            other => Err(format!("unknown camera preset `{other}`")),
        }
    }
}

/// Interaction model of the camera controls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// Free rotation around all axes.
    #[default]
    Trackball,
    /// Rotation constrained to keep the up vector.
    Orbit,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlKind::Trackball => f.write_str("trackball"),
            ControlKind::Orbit => f.write_str("orbit"),
        }
    }
}

/// Programmatic rotation of the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotateAxis {
    /// Around the x-axis (trackball).
    X,
    /// Around the y-axis (trackball).
    Y,
    /// Around the z-axis (trackball).
    Z,
    /// Up/down (orbit).
    Up,
    /// Left/right (orbit).
    Left,
}

impl RotateAxis {
    /// The control model that supports this rotation.
    pub fn required_control(self) -> ControlKind {
        match self {
            RotateAxis::X | RotateAxis::Y | RotateAxis::Z => ControlKind::Trackball,
            RotateAxis::Up | RotateAxis::Left => ControlKind::Orbit,
        }
    }
}
