// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Animation track payload decoding.

use cadview_codec::{revive, Layout};
use cadview_port::AnimationTrack;
use serde_json::Value;

use crate::SyncError;

/// Decode a `tracks` payload into validated tracks.
///
/// Null, `""` and `[]` mean "no tracks". A string payload is parsed as JSON
/// first. Wire arrays inside the payload are decoded; individual tracks that
/// fail validation are logged and skipped.
pub fn parse_tracks(payload: &Value) -> Result<Vec<AnimationTrack>, SyncError> {
    let parsed;
    let value = match payload {
        Value::Null => return Ok(Vec::new()),
        Value::String(text) if text.is_empty() => return Ok(Vec::new()),
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text)
                .map_err(|e| SyncError::Message(format!("tracks: {e}")))?;
            &parsed
        }
        other => other,
    };
    let Value::Array(items) = revive(value.clone(), Layout::Nested) else {
        return Err(SyncError::InvalidValue {
            key: "tracks".into(),
            expected: "list of [path, action, times, values]",
        });
    };
    let mut tracks = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match AnimationTrack::from_value(item) {
            Ok(track) => tracks.push(track),
            Err(err) => tracing::error!(index, error = %err, "animation track skipped"),
        }
    }
    Ok(tracks)
}
