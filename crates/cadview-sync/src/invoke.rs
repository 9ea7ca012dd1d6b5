// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Remote method invocation over a closed capability tree.
//!
//! The remote side names a method by path, e.g. `["viewer", "camera",
//! "presetCamera"]`. Paths are resolved segment by segment through [`Scope`];
//! only the methods listed in [`RemoteMethod`] exist. Anything else is
//! rejected at the boundary with an [`InvokeError`].

use cadview_port::{AnimationControl, CameraPreset, ControlKind, Quat, RotateAxis, Vec3, ViewerError};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::message::MethodCall;

/// Result placeholder for a return value that could not be encoded as JSON.
pub const UNSERIALIZABLE: &str = "<unserializable>";

/// Errors raised while resolving or running a remote method.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// A path segment names no capability.
    #[error("unresolved method path: {0}")]
    UnresolvedPath(String),
    /// The scope exists but has no such method.
    #[error("unknown method: {0}")]
    UnknownMethod(String),
    /// `method` is not a JSON array of strings.
    #[error("malformed method path: {0}")]
    MalformedPath(String),
    /// `args` is not a JSON array.
    #[error("malformed arguments: {0}")]
    MalformedArgs(String),
    /// An argument has the wrong type or value.
    #[error("bad argument for {method}: {reason}")]
    BadArgument {
        /// Method name.
        method: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// Rotation requested for the other control model.
    #[error("rotation needs {required} controls, viewer uses {actual}")]
    WrongControl {
        /// Control model the rotation belongs to.
        required: ControlKind,
        /// Control model of the viewer.
        actual: ControlKind,
    },
    /// The viewer rejected the call.
    #[error(transparent)]
    Viewer(#[from] ViewerError),
    /// The instance has been disposed.
    #[error("viewer instance disposed")]
    Disposed,
}

/// Node of the capability tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// The engine itself.
    Root,
    /// `viewer`
    Viewer,
    /// `viewer.camera`
    Camera,
    /// `viewer.controls`
    Controls,
}

impl Scope {
    /// The child scope named `segment`.
    pub fn child(self, segment: &str) -> Option<Scope> {
        match (self, segment) {
            (Scope::Root, "viewer") => Some(Scope::Viewer),
            (Scope::Viewer, "camera") => Some(Scope::Camera),
            (Scope::Viewer, "controls") => Some(Scope::Controls),
            _ => None,
        }
    }
}

/// Partial camera pose for `viewer.setCameraPose`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoseUpdate {
    /// New position.
    pub position: Option<Vec3>,
    /// New orientation.
    pub quaternion: Option<Quat>,
    /// New look-at target.
    pub target: Option<Vec3>,
    /// New zoom.
    pub zoom: Option<f64>,
}

/// A resolved, argument-checked remote method.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteMethod {
    /// `viewer.dispose()`
    Dispose,
    /// `viewer.update()`
    Update,
    /// `animate()`: (re)start playback of loaded tracks.
    Animate,
    /// `viewer.controlAnimation(cmd)`
    ControlAnimation(AnimationControl),
    /// `pinAsPng()`
    PinAsPng,
    /// `saveAsPng(filename)`
    SaveAsPng(String),
    /// `exportImage()`: returns the capture as the call result.
    ExportImage,
    /// `viewer.camera.presetCamera(name)`
    PresetCamera(CameraPreset),
    /// `viewer.controls.rotate*(degrees)`
    Rotate {
        /// Rotation axis.
        axis: RotateAxis,
        /// Angle in degrees.
        degrees: f64,
    },
    /// `viewer.setCameraPose({...})`
    SetCameraPose(PoseUpdate),
}

/// A method call split into scope path, method name and decoded arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodRequest {
    /// Scope segments before the method name.
    pub path: Vec<String>,
    /// Method name.
    pub name: String,
    /// Decoded arguments; `None` when absent or `null`.
    pub args: Option<Vec<Value>>,
}

impl MethodRequest {
    /// Decode the JSON path and argument strings of `call`.
    pub fn parse(call: &MethodCall) -> Result<Self, InvokeError> {
        let mut path: Vec<String> = serde_json::from_str(&call.method)
            .map_err(|e| InvokeError::MalformedPath(format!("{}: {e}", call.method)))?;
        let name = path
            .pop()
            .ok_or_else(|| InvokeError::MalformedPath("empty path".into()))?;
        let args = match call.args.as_deref() {
            None => None,
            Some(text) => serde_json::from_str::<Option<Vec<Value>>>(text)
                .map_err(|e| InvokeError::MalformedArgs(format!("{text}: {e}")))?,
        };
        Ok(Self { path, name, args })
    }

    /// Dotted form of the full path, for diagnostics.
    pub fn dotted(&self) -> String {
        self.path
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.name.as_str()))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn arg(&self, index: usize) -> Option<&Value> {
        self.args.as_ref().and_then(|args| args.get(index))
    }

    fn str_arg(&self, method: &'static str) -> Result<&str, InvokeError> {
        self.arg(0)
            .and_then(Value::as_str)
            .ok_or_else(|| InvokeError::BadArgument {
                method,
                reason: "expected a string argument".into(),
            })
    }

    fn number_arg(&self, method: &'static str) -> Result<f64, InvokeError> {
        self.arg(0)
            .and_then(Value::as_f64)
            .ok_or_else(|| InvokeError::BadArgument {
                method,
                reason: "expected a numeric argument".into(),
            })
    }

    fn rotate(&self, method: &'static str, axis: RotateAxis) -> Result<RemoteMethod, InvokeError> {
        Ok(RemoteMethod::Rotate {
            axis,
            degrees: self.number_arg(method)?,
        })
    }

    /// Walk the capability tree and check arguments.
    pub fn resolve(&self) -> Result<RemoteMethod, InvokeError> {
        let mut scope = Scope::Root;
        for segment in &self.path {
            scope = scope
                .child(segment)
                .ok_or_else(|| InvokeError::UnresolvedPath(self.dotted()))?;
        }
        let method = match (scope, self.name.as_str()) {
            (Scope::Root, "animate") => RemoteMethod::Animate,
            (Scope::Root, "pinAsPng") => RemoteMethod::PinAsPng,
            (Scope::Root, "saveAsPng") => {
                RemoteMethod::SaveAsPng(self.str_arg("saveAsPng")?.to_owned())
            }
            (Scope::Root, "exportImage") => RemoteMethod::ExportImage,
            (Scope::Viewer, "dispose") => RemoteMethod::Dispose,
            (Scope::Viewer, "update") => RemoteMethod::Update,
            (Scope::Viewer, "controlAnimation") => {
                let name = self.str_arg("controlAnimation")?;
                RemoteMethod::ControlAnimation(AnimationControl::from_name(name).ok_or_else(
                    || InvokeError::BadArgument {
                        method: "controlAnimation",
                        reason: format!("unknown command `{name}`"),
                    },
                )?)
            }
            (Scope::Viewer, "setCameraPose") => {
                let pose = self.arg(0).cloned().unwrap_or(Value::Null);
                let pose = if pose.is_null() {
                    PoseUpdate::default()
                } else {
                    serde_json::from_value(pose).map_err(|e| InvokeError::BadArgument {
                        method: "setCameraPose",
                        reason: e.to_string(),
                    })?
                };
                RemoteMethod::SetCameraPose(pose)
            }
            (Scope::Camera, "presetCamera") => RemoteMethod::PresetCamera(
                self.str_arg("presetCamera")?
                    .parse()
                    .map_err(|reason| InvokeError::BadArgument {
                        method: "presetCamera",
                        reason,
                    })?,
            ),
            (Scope::Controls, "rotateX") => self.rotate("rotateX", RotateAxis::X)?,
            (Scope::Controls, "rotateY") => self.rotate("rotateY", RotateAxis::Y)?,
            (Scope::Controls, "rotateZ") => self.rotate("rotateZ", RotateAxis::Z)?,
            (Scope::Controls, "rotateUp") => self.rotate("rotateUp", RotateAxis::Up)?,
            (Scope::Controls, "rotateLeft") => self.rotate("rotateLeft", RotateAxis::Left)?,
            _ => return Err(InvokeError::UnknownMethod(self.dotted())),
        };
        Ok(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(method: &str, args: Option<&str>) -> Result<RemoteMethod, InvokeError> {
        MethodRequest::parse(&MethodCall {
            id: None,
            method: method.into(),
            args: args.map(Into::into),
        })?
        .resolve()
    }

    #[test]
    fn capability_tree_resolves() {
        assert_eq!(resolve(r#"["animate"]"#, None), Ok(RemoteMethod::Animate));
        assert_eq!(
            resolve(r#"["viewer","camera","presetCamera"]"#, Some(r#"["iso"]"#)),
            Ok(RemoteMethod::PresetCamera(CameraPreset::Iso))
        );
        assert_eq!(
            resolve(r#"["viewer","controls","rotateLeft"]"#, Some("[15]")),
            Ok(RemoteMethod::Rotate {
                axis: RotateAxis::Left,
                degrees: 15.0
            })
        );
        assert_eq!(
            resolve(r#"["viewer","controlAnimation"]"#, Some(r#"["pause"]"#)),
            Ok(RemoteMethod::ControlAnimation(AnimationControl::Pause))
        );
        assert_eq!(
            resolve(r#"["saveAsPng"]"#, Some(r#"["out.png"]"#)),
            Ok(RemoteMethod::SaveAsPng("out.png".into()))
        );
        assert_eq!(
            resolve(r#"["viewer","setCameraPose"]"#, Some(r#"[{"zoom": 2.5}]"#)),
            Ok(RemoteMethod::SetCameraPose(PoseUpdate {
                zoom: Some(2.5),
                ..PoseUpdate::default()
            }))
        );
        assert_eq!(resolve(r#"["viewer","dispose"]"#, Some("null")), Ok(RemoteMethod::Dispose));
    }

    #[test]
    fn reflection_outside_the_tree_is_rejected() {
        assert_eq!(
            resolve(r#"["viewer","renderer","domElement","remove"]"#, None),
            Err(InvokeError::UnresolvedPath("viewer.renderer.domElement.remove".into()))
        );
        assert_eq!(
            resolve(r#"["viewer","clear"]"#, None),
            Err(InvokeError::UnknownMethod("viewer.clear".into()))
        );
    }

    #[test]
    fn malformed_inputs_are_reported() {
        assert!(matches!(resolve("viewer.update", None), Err(InvokeError::MalformedPath(_))));
        assert!(matches!(resolve("[]", None), Err(InvokeError::MalformedPath(_))));
        assert!(matches!(
            resolve(r#"["viewer","update"]"#, Some("{")),
            Err(InvokeError::MalformedArgs(_))
        ));
        assert!(matches!(
            resolve(r#"["viewer","camera","presetCamera"]"#, Some(r#"["sideways"]"#)),
            Err(InvokeError::BadArgument { method: "presetCamera", .. })
        ));
        assert!(matches!(
            resolve(r#"["viewer","controls","rotateX"]"#, None),
            Err(InvokeError::BadArgument { method: "rotateX", .. })
        ));
        assert!(matches!(
            resolve(r#"["viewer","setCameraPose"]"#, Some(r#"[{"fov": 30}]"#)),
            Err(InvokeError::BadArgument { method: "setCameraPose", .. })
        ));
    }
}
