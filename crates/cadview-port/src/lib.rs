// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Viewer port contract for the CadView bridge.
//!
//! This crate defines the capability surface between the state-sync engine
//! and a rendering engine. It contains NO wire decoding; that lives in
//! cadview-codec.
//!
//! # Design Principles
//!
//! - **Viewers are opaque**: The engine only talks to [`ViewerPort`].
//! - **Setters are silent**: A port setter never emits a local change
//!   notification; only user interaction does.
//! - **Hosts are ports too**: The document that owns viewer containers and
//!   the docking shell are consumed through [`HostDocument`] and [`ShellPort`].

use thiserror::Error;

/// Error type for viewer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewerError {
    /// The viewer could not build or draw the scene.
    #[error("render failed: {0}")]
    Render(String),
    /// The canvas could not be captured as an image.
    #[error("snapshot failed: {0}")]
    Snapshot(String),
    /// Display or viewer options are out of range.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    /// The rendering resource has already been released.
    #[error("viewer disposed")]
    Disposed,
    /// A backend-specific error occurred.
    #[error("backend error: {0}")]
    Backend(String),
}

mod camera;
mod host;
mod options;
mod port;
mod scene;
mod track;

pub use camera::{CameraPose, CameraPreset, ControlKind, Quat, RotateAxis, Vec3};
pub use host::{Anchor, HostDocument, ShellPort};
pub use options::{
    AnimationControl, ClipPlane, DisplayOptions, ImageCapture, RenderOptions, States, Tab, Theme,
    ViewFlag, ViewScalar, ViewerOptions, Visibility,
};
pub use port::ViewerPort;
pub use scene::{
    ArrayData, BufferField, DType, Group, NumericArray, Part, Parts, SceneDocument, SceneNode,
    Shape, Tessellation,
};
pub use track::{tracks_duration, AnimationTrack, TrackAction, TrackError, TrackValues};
