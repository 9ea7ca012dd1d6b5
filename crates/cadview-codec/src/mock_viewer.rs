// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mock viewer for headless testing of the sync engine.
//!
//! MockViewer keeps every piece of viewer state in plain fields without any
//! rendering. Counters record how often lifecycle calls happened so tests can
//! assert on exactly-once behavior.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cadview_port::{
    AnimationControl, AnimationTrack, CameraPose, CameraPreset, ClipPlane, ControlKind,
    DisplayOptions, ImageCapture, Quat, RenderOptions, RotateAxis, SceneDocument, States, Tab,
    Vec3, ViewFlag, ViewScalar, ViewerError, ViewerOptions, ViewerPort,
};

/// Mock viewer for testing.
///
/// Implements `ViewerPort` by tracking state in fields.
#[derive(Debug, Clone)]
pub struct MockViewer {
    /// Current camera pose.
    pub camera: CameraPose,
    /// Pose a render lands on when the options do not dictate one.
    pub fit_pose: CameraPose,
    /// Pose of the "reset view" button.
    pub reset_location: Option<CameraPose>,
    /// Camera control model set by the last render.
    pub control: ControlKind,
    /// Toggle values.
    pub flags: BTreeMap<ViewFlag, bool>,
    /// Scalar values.
    pub scalars: BTreeMap<ViewScalar, f64>,
    /// Grid visibility.
    pub grid: [bool; 3],
    /// Tree collapse level.
    pub collapse: u32,
    /// Default edge color.
    pub edge_color: String,
    /// Clipping plane normals.
    pub clip_normals: [Vec3; 3],
    /// Clipping plane sliders.
    pub clip_sliders: [f64; 3],
    /// Visibility states.
    pub states: States,
    /// Active tab.
    pub tab: Tab,
    /// Number of parts in the rendered scene.
    pub part_count: usize,
    /// Registered animation tracks.
    pub tracks: Vec<AnimationTrack>,
    /// `(duration, speed)` of the initialized animation.
    pub animation: Option<(f64, f64)>,
    /// Playback commands received.
    pub animation_controls: Vec<AnimationControl>,
    /// Last camera preset.
    pub last_preset: Option<CameraPreset>,
    /// Rotations received.
    pub rotations: Vec<(RotateAxis, f64)>,
    /// Canvas size `(width, height)`.
    pub canvas: (u32, u32),
    /// When set, `render` fails with this message.
    pub fail_render: Option<String>,
    /// Number of successful render calls.
    pub render_count: u32,
    /// Number of clear calls.
    pub clear_count: u32,
    /// Number of update calls.
    pub update_count: u32,
    /// Number of dispose calls.
    pub dispose_count: u32,
    /// Whether dispose has been called.
    pub disposed: bool,
}

impl Default for MockViewer {
    fn default() -> Self {
        Self {
            camera: CameraPose::default(),
            fit_pose: CameraPose::default(),
            reset_location: None,
            control: ControlKind::Trackball,
            flags: BTreeMap::new(),
            scalars: BTreeMap::new(),
            grid: [false; 3],
            collapse: 0,
            edge_color: RenderOptions::default().default_edgecolor,
            clip_normals: [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]],
            clip_sliders: [0.0; 3],
            states: States::new(),
            tab: Tab::Tree,
            part_count: 0,
            tracks: Vec::new(),
            animation: None,
            animation_controls: Vec::new(),
            last_preset: None,
            rotations: Vec::new(),
            canvas: (800, 600),
            fail_render: None,
            render_count: 0,
            clear_count: 0,
            update_count: 0,
            dispose_count: 0,
            disposed: false,
        }
    }
}

impl MockViewer {
    /// Create a new mock viewer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock viewer sized for `display`.
    pub fn with_display(display: &DisplayOptions) -> Self {
        Self {
            canvas: (display.cad_width, display.height),
            ..Self::default()
        }
    }
}

fn preset_direction(preset: CameraPreset) -> Vec3 {
    match preset {
        CameraPreset::Iso => [1.0, 1.0, 1.0],
        CameraPreset::Top => [0.0, 0.0, 1.0],
        CameraPreset::Bottom => [0.0, 0.0, -1.0],
        CameraPreset::Left => [0.0, -1.0, 0.0],
        CameraPreset::Right => [0.0, 1.0, 0.0],
        CameraPreset::Front => [1.0, 0.0, 0.0],
        CameraPreset::Rear => [-1.0, 0.0, 0.0],
    }
}

impl ViewerPort for MockViewer {
    fn render(
        &mut self,
        scene: &SceneDocument,
        states: &States,
        render_options: &RenderOptions,
        viewer_options: &ViewerOptions,
    ) -> Result<(), ViewerError> {
        if self.disposed {
            return Err(ViewerError::Disposed);
        }
        if let Some(message) = &self.fail_render {
            return Err(ViewerError::Render(message.clone()));
        }
        self.part_count = scene.part_count();
        self.states = states.clone();
        self.control = viewer_options.control;
        for flag in ViewFlag::ALL {
            self.flags.insert(flag, viewer_options.flag(flag));
        }
        let scalars = [
            (ViewScalar::AmbientIntensity, render_options.ambient_intensity),
            (ViewScalar::DirectIntensity, render_options.direct_intensity),
            (ViewScalar::Metalness, render_options.metalness),
            (ViewScalar::Roughness, render_options.roughness),
            (ViewScalar::DefaultOpacity, render_options.default_opacity),
            (ViewScalar::ZoomSpeed, viewer_options.zoom_speed),
            (ViewScalar::PanSpeed, viewer_options.pan_speed),
            (ViewScalar::RotateSpeed, viewer_options.rotate_speed),
        ];
        self.scalars.extend(scalars);
        self.grid = viewer_options.grid;
        self.collapse = viewer_options.collapse;
        self.edge_color.clone_from(&render_options.default_edgecolor);

        let mut pose = self.fit_pose;
        if let Some(position) = viewer_options.position {
            pose.position = position;
        }
        if let Some(quaternion) = viewer_options.quaternion {
            pose.quaternion = quaternion;
        }
        if let Some(target) = viewer_options.target {
            pose.target = target;
        }
        if let Some(zoom) = viewer_options.zoom {
            pose.zoom = zoom;
        }
        self.camera = pose;
        self.render_count += 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.clear_count += 1;
        self.part_count = 0;
        self.states.clear();
    }

    fn dispose(&mut self) {
        self.dispose_count += 1;
        self.disposed = true;
        self.part_count = 0;
        self.tracks.clear();
        self.animation = None;
    }

    fn camera(&self) -> CameraPose {
        self.camera
    }

    fn set_camera_position(&mut self, position: Vec3) {
        self.camera.position = position;
    }

    fn set_camera_quaternion(&mut self, quaternion: Quat) {
        self.camera.quaternion = quaternion;
    }

    fn set_camera_target(&mut self, target: Vec3) {
        self.camera.target = target;
    }

    fn set_camera_zoom(&mut self, zoom: f64) {
        self.camera.zoom = zoom;
    }

    fn set_reset_location(&mut self, pose: &CameraPose) {
        self.reset_location = Some(*pose);
    }

    fn preset_camera(&mut self, preset: CameraPreset) {
        self.last_preset = Some(preset);
        self.camera.position = preset_direction(preset);
    }

    fn rotate(&mut self, axis: RotateAxis, degrees: f64) -> Result<(), ViewerError> {
        if axis.required_control() != self.control {
            return Err(ViewerError::Backend(format!(
                "{axis:?} rotation needs {} controls",
                axis.required_control()
            )));
        }
        self.rotations.push((axis, degrees));
        Ok(())
    }

    fn update(&mut self) {
        self.update_count += 1;
    }

    fn flag(&self, flag: ViewFlag) -> bool {
        self.flags.get(&flag).copied().unwrap_or(false)
    }

    fn set_flag(&mut self, flag: ViewFlag, value: bool) {
        self.flags.insert(flag, value);
    }

    fn scalar(&self, scalar: ViewScalar) -> f64 {
        self.scalars.get(&scalar).copied().unwrap_or(0.0)
    }

    fn set_scalar(&mut self, scalar: ViewScalar, value: f64) {
        self.scalars.insert(scalar, value);
    }

    fn grid(&self) -> [bool; 3] {
        self.grid
    }

    fn set_grid(&mut self, grid: [bool; 3]) {
        self.grid = grid;
    }

    fn collapse(&self) -> u32 {
        self.collapse
    }

    fn set_collapse(&mut self, level: u32) {
        self.collapse = level;
    }

    fn edge_color(&self) -> String {
        self.edge_color.clone()
    }

    fn set_edge_color(&mut self, color: &str) {
        color.clone_into(&mut self.edge_color);
    }

    fn clip_normal(&self, plane: ClipPlane) -> Vec3 {
        self.clip_normals[plane.index()]
    }

    fn set_clip_normal(&mut self, plane: ClipPlane, normal: Vec3) {
        self.clip_normals[plane.index()] = normal;
    }

    fn clip_slider(&self, plane: ClipPlane) -> f64 {
        self.clip_sliders[plane.index()]
    }

    fn set_clip_slider(&mut self, plane: ClipPlane, value: f64) {
        self.clip_sliders[plane.index()] = value;
    }

    fn states(&self) -> States {
        self.states.clone()
    }

    fn set_states(&mut self, updates: &States) {
        self.states
            .extend(updates.iter().map(|(path, vis)| (path.clone(), *vis)));
    }

    fn active_tab(&self) -> Tab {
        self.tab
    }

    fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    fn add_animation_track(&mut self, track: &AnimationTrack) {
        self.tracks.push(track.clone());
    }

    fn init_animation(&mut self, duration: f64, speed: f64) {
        self.animation = Some((duration, speed));
    }

    fn control_animation(&mut self, control: AnimationControl) {
        self.animation_controls.push(control);
    }

    fn animation_active(&self) -> bool {
        self.animation.is_some()
    }

    fn clear_animation(&mut self) {
        self.tracks.clear();
        self.animation = None;
    }

    fn snapshot(&mut self) -> Result<ImageCapture, ViewerError> {
        if self.disposed {
            return Err(ViewerError::Disposed);
        }
        let (width, height) = self.canvas;
        Ok(ImageCapture {
            src: format!(
                "data:image/png;base64,{}",
                STANDARD.encode(format!("mock-{width}x{height}"))
            ),
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadview_port::{SceneNode, ViewerOptions};

    fn empty_scene() -> SceneDocument {
        SceneDocument {
            instances: Vec::new(),
            root: SceneNode::Opaque(serde_json::Value::Null),
        }
    }

    #[test]
    fn render_applies_options_and_requested_pose() {
        let mut viewer = MockViewer::new();
        let options = ViewerOptions {
            axes: true,
            zoom: Some(2.5),
            position: Some([3.0, 0.0, 0.0]),
            ..ViewerOptions::default()
        };
        viewer
            .render(&empty_scene(), &States::new(), &RenderOptions::default(), &options)
            .unwrap();
        assert_eq!(viewer.render_count, 1);
        assert!(viewer.flag(ViewFlag::Axes));
        assert!(viewer.flag(ViewFlag::Ortho));
        assert_eq!(viewer.camera.zoom, 2.5);
        assert_eq!(viewer.camera.position, [3.0, 0.0, 0.0]);
        assert_eq!(viewer.scalar(ViewScalar::AmbientIntensity), 0.5);
    }

    #[test]
    fn render_fails_after_dispose() {
        let mut viewer = MockViewer::new();
        viewer.dispose();
        assert_eq!(
            viewer.render(
                &empty_scene(),
                &States::new(),
                &RenderOptions::default(),
                &ViewerOptions::default()
            ),
            Err(ViewerError::Disposed)
        );
        assert!(viewer.snapshot().is_err());
    }

    #[test]
    fn states_merge() {
        let mut viewer = MockViewer::new();
        viewer.states.insert("/a".into(), [1, 1]);
        viewer.set_states(&States::from([("/b".to_owned(), [0, 1])]));
        viewer.set_states(&States::from([("/a".to_owned(), [0, 0])]));
        assert_eq!(viewer.states["/a"], [0, 0]);
        assert_eq!(viewer.states["/b"], [0, 1]);
    }

    #[test]
    fn orbit_rotation_needs_orbit_controls() {
        let mut viewer = MockViewer::new();
        assert!(viewer.rotate(RotateAxis::Up, 10.0).is_err());
        assert!(viewer.rotate(RotateAxis::X, 10.0).is_ok());
        assert_eq!(viewer.rotations, vec![(RotateAxis::X, 10.0)]);
    }

    #[test]
    fn snapshot_reports_canvas_size() {
        let mut viewer = MockViewer::with_display(&DisplayOptions {
            cad_width: 1024,
            height: 768,
            ..DisplayOptions::default()
        });
        let image = viewer.snapshot().unwrap();
        assert_eq!((image.width, image.height), (1024, 768));
        assert!(image.src.starts_with("data:image/png;base64,"));
    }
}
