// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Local mirror of the remote property map.

use cadview_port::States;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::message::{OutboundMessage, RemoteChannel};
use crate::tolerance::is_tol_equal_with;

// bulk payloads never feed an option bundle
const PAYLOAD_KEYS: [&str; 5] = ["shapes", "states", "tracks", "result", "state_updates"];

/// Mirror of the remote model plus the batch of local writes not yet flushed.
#[derive(Debug, Clone)]
pub struct RemoteModel {
    values: Map<String, Value>,
    pending: Map<String, Value>,
    tolerance: f64,
}

impl RemoteModel {
    /// Seed the mirror with the remote side's initial values.
    pub fn new(initial: Map<String, Value>, tolerance: f64) -> Self {
        Self {
            values: initial,
            pending: Map::new(),
            tolerance,
        }
    }

    /// Tolerance used by [`RemoteModel::set`].
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// All mirrored values.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Whether `key` holds something other than null or an empty string/list/object.
    pub fn is_set(&self, key: &str) -> bool {
        match self.values.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        }
    }

    /// Boolean value of `key`; anything but `true` is false.
    pub fn flag(&self, key: &str) -> bool {
        self.values.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Record a value received from the remote side. Never queued for flush.
    pub fn store(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_owned(), value);
    }

    /// Record a local value for the remote side.
    ///
    /// Returns false, and queues nothing, when the mirror already holds a
    /// tolerantly equal value.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        if self
            .values
            .get(key)
            .is_some_and(|current| is_tol_equal_with(current, &value, self.tolerance))
        {
            return false;
        }
        self.force(key, value);
        true
    }

    /// Record and queue a local value even if it is unchanged.
    pub fn force(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_owned(), value.clone());
        self.pending.insert(key.to_owned(), value);
    }

    /// Whether local writes are waiting for a flush.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Send all queued writes as one update. Returns false if nothing was queued.
    pub fn flush<C: RemoteChannel + ?Sized>(&mut self, channel: &mut C) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let changes = std::mem::take(&mut self.pending);
        tracing::trace!(keys = changes.len(), "flushing model changes");
        channel.send(OutboundMessage::Update { changes });
        true
    }

    /// Deserialize an option bundle from the mirror, ignoring null entries.
    ///
    /// Values are admitted one key at a time; a value the bundle cannot hold
    /// is skipped with a warning and that field keeps its default.
    pub fn options<T: DeserializeOwned + Default>(&self) -> T {
        let mut accepted = Map::new();
        for (key, value) in &self.values {
            if value.is_null() || PAYLOAD_KEYS.contains(&key.as_str()) {
                continue;
            }
            accepted.insert(key.clone(), value.clone());
            if serde_json::from_value::<T>(Value::Object(accepted.clone())).is_err() {
                tracing::warn!(
                    %key,
                    options = std::any::type_name::<T>(),
                    "model value does not fit the options, keeping the default"
                );
                accepted.remove(key);
            }
        }
        serde_json::from_value(Value::Object(accepted)).unwrap_or_default()
    }

    /// Visibility states sent along with the scene.
    pub fn states(&self) -> States {
        match self.values.get("states") {
            None | Some(Value::Null) => States::new(),
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|err| {
                tracing::error!(error = %err, "invalid states payload ignored");
                States::new()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadview_port::ViewerOptions;
    use serde_json::json;

    fn model(initial: Value) -> RemoteModel {
        let Value::Object(map) = initial else {
            unreachable!("test seeds are objects")
        };
        RemoteModel::new(map, 1e-9)
    }

    #[test]
    fn set_skips_tolerantly_equal_values() {
        let mut m = model(json!({"zoom": 1.0}));
        assert!(!m.set("zoom", json!(1.0 + 1e-12)));
        assert!(!m.has_pending());
        assert!(m.set("zoom", json!(2.0)));
        assert!(m.has_pending());
    }

    #[test]
    fn flush_sends_one_batch() {
        let mut m = model(json!({}));
        m.set("zoom", json!(2.0));
        m.set("position", json!([1.0, 2.0, 3.0]));
        let mut sent: Vec<OutboundMessage> = Vec::new();
        assert!(m.flush(&mut sent));
        assert!(!m.flush(&mut sent));
        assert_eq!(sent.len(), 1);
        let OutboundMessage::Update { changes } = &sent[0] else {
            unreachable!("flush only sends updates")
        };
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn store_is_not_echoed() {
        let mut m = model(json!({}));
        m.store("axes", json!(true));
        assert!(!m.has_pending());
        assert!(m.flag("axes"));
    }

    #[test]
    fn options_skip_nulls_and_survive_garbage() {
        let m = model(json!({"axes": true, "position": null, "ticks": 12}));
        let options: ViewerOptions = m.options();
        assert!(options.axes);
        assert_eq!(options.ticks, 12);
        assert_eq!(options.position, None);

        let bad = model(json!({"ticks": "many"}));
        assert_eq!(bad.options::<ViewerOptions>(), ViewerOptions::default());
    }

    #[test]
    fn one_bad_value_does_not_reset_the_others() {
        let m = model(json!({
            "axes": true,
            "control": "bogus",
            "grid": [true, false, true],
            "ticks": -5,
            "zoom": 2.0
        }));
        let options: ViewerOptions = m.options();
        assert!(options.axes);
        assert_eq!(options.grid, [true, false, true]);
        assert_eq!(options.zoom, Some(2.0));
        assert_eq!(options.control, ViewerOptions::default().control);
        assert_eq!(options.ticks, ViewerOptions::default().ticks);
    }

    #[test]
    fn is_set_treats_empty_payloads_as_unset() {
        let m = model(json!({"shapes": "", "states": {}, "tracks": [], "zoom": 0}));
        assert!(!m.is_set("shapes"));
        assert!(!m.is_set("states"));
        assert!(!m.is_set("tracks"));
        assert!(!m.is_set("missing"));
        assert!(m.is_set("zoom"));
    }
}
