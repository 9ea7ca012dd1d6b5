// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Animation tracks: keyframed transforms of one object path.

use core::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// Transform animated by a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackAction {
    /// Translate by a 3-vector.
    T,
    /// Translate along x.
    Tx,
    /// Translate along y.
    Ty,
    /// Translate along z.
    Tz,
    /// Rotate by a quaternion `[x, y, z, w]`.
    Q,
    /// Rotate around x, in degrees.
    Rx,
    /// Rotate around y, in degrees.
    Ry,
    /// Rotate around z, in degrees.
    Rz,
}

impl TrackAction {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            TrackAction::T => "t",
            TrackAction::Tx => "tx",
            TrackAction::Ty => "ty",
            TrackAction::Tz => "tz",
            TrackAction::Q => "q",
            TrackAction::Rx => "rx",
            TrackAction::Ry => "ry",
            TrackAction::Rz => "rz",
        }
    }

    /// Number of components of one keyframe value (1, 3 or 4).
    pub fn value_width(self) -> usize {
        match self {
            TrackAction::T => 3,
            TrackAction::Q => 4,
            _ => 1,
        }
    }
}

impl FromStr for TrackAction {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "t" => TrackAction::T,
            "tx" => TrackAction::Tx,
            "ty" => TrackAction::Ty,
            "tz" => TrackAction::Tz,
            "q" => TrackAction::Q,
            "rx" => TrackAction::Rx,
            "ry" => TrackAction::Ry,
            "rz" => TrackAction::Rz,
            other => return Err(TrackError::UnknownAction(other.to_owned())),
        })
    }
}

/// Keyframe values, typed by action width.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackValues {
    /// Distances or angles.
    Scalars(Vec<f64>),
    /// Position vectors.
    Vectors(Vec<[f64; 3]>),
    /// Rotation quaternions.
    Quaternions(Vec<[f64; 4]>),
}

impl TrackValues {
    /// Number of keyframes.
    pub fn len(&self) -> usize {
        match self {
            TrackValues::Scalars(v) => v.len(),
            TrackValues::Vectors(v) => v.len(),
            TrackValues::Quaternions(v) => v.len(),
        }
    }

    /// Whether there are no keyframes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Errors raised while validating a track.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    /// Action name is not one of `t tx ty tz q rx ry rz`.
    #[error("unknown track action `{0}`")]
    UnknownAction(String),
    /// `times` and `values` differ in length.
    #[error("track has {times} times but {values} values")]
    LengthMismatch {
        /// Number of keyframe times.
        times: usize,
        /// Number of keyframe values.
        values: usize,
    },
    /// A value does not fit the action.
    #[error("value {index} of `{action}` track: {reason}")]
    BadValue {
        /// Action name.
        action: &'static str,
        /// Keyframe index.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },
    /// The track is not `[path, action, times, values]`.
    #[error("malformed track: {0}")]
    Malformed(String),
}

/// One animation track: `[path, action, times, values]` on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationTrack {
    /// Object path the track moves.
    pub path: String,
    /// Transform kind.
    pub action: TrackAction,
    /// Keyframe times in seconds.
    pub times: Vec<f64>,
    /// Keyframe values, one per time.
    pub values: TrackValues,
}

impl AnimationTrack {
    /// Build a validated track.
    pub fn new(
        path: impl Into<String>,
        action: TrackAction,
        times: Vec<f64>,
        values: TrackValues,
    ) -> Result<Self, TrackError> {
        let width_ok = matches!(
            (&values, action.value_width()),
            (TrackValues::Scalars(_), 1)
                | (TrackValues::Vectors(_), 3)
                | (TrackValues::Quaternions(_), 4)
        );
        if !width_ok {
            return Err(TrackError::BadValue {
                action: action.as_str(),
                index: 0,
                reason: format!("expected {}-component values", action.value_width()),
            });
        }
        if times.len() != values.len() {
            return Err(TrackError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        Ok(Self {
            path: path.into(),
            action,
            times,
            values,
        })
    }

    /// Parse the wire form `[path, action, times, values]`.
    pub fn from_value(value: &Value) -> Result<Self, TrackError> {
        let items = match value.as_array() {
            Some(items) if items.len() == 4 => items,
            _ => {
                return Err(TrackError::Malformed(
                    "expected [path, action, times, values]".into(),
                ))
            }
        };
        let path = items[0]
            .as_str()
            .ok_or_else(|| TrackError::Malformed("path must be a string".into()))?;
        let action: TrackAction = items[1]
            .as_str()
            .ok_or_else(|| TrackError::Malformed("action must be a string".into()))?
            .parse()?;
        let times = items[2]
            .as_array()
            .ok_or_else(|| TrackError::Malformed("times must be a list".into()))?
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| TrackError::Malformed("times must be numbers".into()))?;
        let raw = items[3]
            .as_array()
            .ok_or_else(|| TrackError::Malformed("values must be a list".into()))?;
        let values = match action.value_width() {
            1 => TrackValues::Scalars(
                raw.iter()
                    .enumerate()
                    .map(|(index, v)| v.as_f64().ok_or_else(|| bad(action, index, "number")))
                    .collect::<Result<_, _>>()?,
            ),
            3 => TrackValues::Vectors(
                raw.iter()
                    .enumerate()
                    .map(|(index, v)| fixed::<3>(v).ok_or_else(|| bad(action, index, "3-vector")))
                    .collect::<Result<_, _>>()?,
            ),
            _ => TrackValues::Quaternions(
                raw.iter()
                    .enumerate()
                    .map(|(index, v)| {
                        fixed::<4>(v).ok_or_else(|| bad(action, index, "quaternion"))
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };
        Self::new(path, action, times, values)
    }

    /// Wire form `[path, action, times, values]`.
    pub fn to_value(&self) -> Value {
        let values = match &self.values {
            TrackValues::Scalars(v) => serde_json::json!(v),
            TrackValues::Vectors(v) => serde_json::json!(v),
            TrackValues::Quaternions(v) => serde_json::json!(v),
        };
        serde_json::json!([self.path, self.action.as_str(), self.times, values])
    }

    /// Largest keyframe time; 0 for an empty track.
    pub fn duration(&self) -> f64 {
        self.times.iter().copied().fold(0.0, f64::max)
    }
}

fn bad(action: TrackAction, index: usize, expected: &str) -> TrackError {
    TrackError::BadValue {
        action: action.as_str(),
        index,
        reason: format!("expected a {expected}"),
    }
}

fn fixed<const N: usize>(value: &Value) -> Option<[f64; N]> {
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

/// Animation length: the largest time over all tracks.
pub fn tracks_duration(tracks: &[AnimationTrack]) -> f64 {
    tracks
        .iter()
        .map(AnimationTrack::duration)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_vector_track() {
        let track =
            AnimationTrack::from_value(&json!(["/a/b", "t", [0, 1], [[0, 0, 0], [1, 2, 3]]]))
                .unwrap();
        assert_eq!(track.action, TrackAction::T);
        assert_eq!(
            track.values,
            TrackValues::Vectors(vec![[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]])
        );
        assert_eq!(track.to_value(), json!(["/a/b", "t", [0.0, 1.0], [[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]]]));
    }

    #[test]
    fn rejects_unknown_action_and_length_mismatch() {
        assert_eq!(
            AnimationTrack::from_value(&json!(["/a", "sx", [0], [1]])),
            Err(TrackError::UnknownAction("sx".into()))
        );
        assert_eq!(
            AnimationTrack::from_value(&json!(["/a", "rz", [0, 1, 2], [0, 90]])),
            Err(TrackError::LengthMismatch { times: 3, values: 2 })
        );
        assert!(matches!(
            AnimationTrack::from_value(&json!(["/a", "q", [0], [[0, 0, 1]]])),
            Err(TrackError::BadValue { index: 0, .. })
        ));
    }

    #[test]
    fn duration_is_max_time_over_tracks() {
        let a = AnimationTrack::from_value(&json!(["/a", "rx", [0, 2.5], [0, 90]])).unwrap();
        let b = AnimationTrack::from_value(&json!(["/b", "tz", [0, 4, 1], [0, 1, 2]])).unwrap();
        assert!((tracks_duration(&[a, b]) - 4.0).abs() < f64::EPSILON);
        assert!(tracks_duration(&[]).abs() < f64::EPSILON);
    }
}
