// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Viewer port trait defining the rendering-engine contract.

use crate::{
    AnimationControl, AnimationTrack, CameraPose, CameraPreset, ClipPlane, ImageCapture, Quat,
    RenderOptions, RotateAxis, SceneDocument, States, Tab, Vec3, ViewFlag, ViewScalar,
    ViewerError, ViewerOptions,
};

/// Rendering engine port.
///
/// The sync engine drives a viewer exclusively through this trait.
///
/// # Silence
///
/// Every setter here is silent: implementors must not report the change back
/// as a local user interaction. Only genuine interaction (mouse, tool bar)
/// produces local change notifications, and those travel outside this trait.
pub trait ViewerPort {
    /// Build and draw a decoded scene with the given visibility states.
    fn render(
        &mut self,
        scene: &SceneDocument,
        states: &States,
        render_options: &RenderOptions,
        viewer_options: &ViewerOptions,
    ) -> Result<(), ViewerError>;

    /// Remove the current scene, keeping the canvas alive.
    fn clear(&mut self);

    /// Release every rendering resource. Further calls are no-ops.
    fn dispose(&mut self);

    /// Current camera pose.
    fn camera(&self) -> CameraPose;
    /// Move the camera.
    fn set_camera_position(&mut self, position: Vec3);
    /// Orient the camera.
    fn set_camera_quaternion(&mut self, quaternion: Quat);
    /// Change the look-at target.
    fn set_camera_target(&mut self, target: Vec3);
    /// Change the zoom factor.
    fn set_camera_zoom(&mut self, zoom: f64);
    /// Store the pose the "reset view" button returns to.
    fn set_reset_location(&mut self, pose: &CameraPose);
    /// Jump to a predefined direction.
    fn preset_camera(&mut self, preset: CameraPreset);
    /// Rotate the scene by `degrees` around `axis`.
    fn rotate(&mut self, axis: RotateAxis, degrees: f64) -> Result<(), ViewerError>;
    /// Redraw after programmatic changes.
    fn update(&mut self);

    /// Read a toggle.
    fn flag(&self, flag: ViewFlag) -> bool;
    /// Set a toggle.
    fn set_flag(&mut self, flag: ViewFlag, value: bool);
    /// Read a scalar setting.
    fn scalar(&self, scalar: ViewScalar) -> f64;
    /// Set a scalar setting.
    fn set_scalar(&mut self, scalar: ViewScalar, value: f64);
    /// Grid visibility for `xy`, `xz`, `yz`.
    fn grid(&self) -> [bool; 3];
    /// Set grid visibility.
    fn set_grid(&mut self, grid: [bool; 3]);
    /// Tree collapse level.
    fn collapse(&self) -> u32;
    /// Set tree collapse level.
    fn set_collapse(&mut self, level: u32);
    /// Default edge color in web format.
    fn edge_color(&self) -> String;
    /// Set the default edge color.
    fn set_edge_color(&mut self, color: &str);

    /// Normal of a clipping plane.
    fn clip_normal(&self, plane: ClipPlane) -> Vec3;
    /// Set the normal of a clipping plane.
    fn set_clip_normal(&mut self, plane: ClipPlane, normal: Vec3);
    /// Slider position of a clipping plane.
    fn clip_slider(&self, plane: ClipPlane) -> f64;
    /// Set the slider position of a clipping plane.
    fn set_clip_slider(&mut self, plane: ClipPlane, value: f64);

    /// Visibility states of every object path.
    fn states(&self) -> States;
    /// Merge visibility updates into the current states.
    fn set_states(&mut self, updates: &States);
    /// Active side panel tab.
    fn active_tab(&self) -> Tab;
    /// Switch the side panel tab.
    fn select_tab(&mut self, tab: Tab);

    /// Register one animation track.
    fn add_animation_track(&mut self, track: &AnimationTrack);
    /// Prepare playback of all tracks; `duration` in seconds.
    fn init_animation(&mut self, duration: f64, speed: f64);
    /// Play, stop or pause the animation.
    fn control_animation(&mut self, control: AnimationControl);
    /// Whether an animation is initialized.
    fn animation_active(&self) -> bool;
    /// Stop playback and drop every track.
    fn clear_animation(&mut self);

    /// Capture the canvas as a PNG.
    fn snapshot(&mut self) -> Result<ImageCapture, ViewerError>;
}
