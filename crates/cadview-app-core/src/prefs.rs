// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted bridge preferences (sync tuning + default viewer geometry).

use cadview_port::DisplayOptions;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigService, ConfigStore};

/// Config key the bridge preferences are stored under.
pub const BRIDGE_PREFS_KEY: &str = "bridge";

/// Saved preferences for the viewer bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BridgePrefs {
    /// State-sync tuning.
    pub sync: SyncPrefs,
    /// Geometry used when a viewer is created without explicit display options.
    pub display: DisplayOptions,
}

/// Knobs of the state-sync engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPrefs {
    /// Absolute tolerance of numeric comparisons.
    pub tolerance: f64,
    /// Sweep stale inline viewers before creating a new one.
    pub sweep_inline_on_create: bool,
    /// Log every applied and reported property change at debug level.
    pub trace_changes: bool,
}

impl Default for SyncPrefs {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            sweep_inline_on_create: true,
            trace_changes: false,
        }
    }
}

impl BridgePrefs {
    /// Load the stored preferences, falling back to defaults on any error.
    pub fn load_or_default<S: ConfigStore>(config: &ConfigService<S>) -> Self {
        match config.load::<Self>(BRIDGE_PREFS_KEY) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => Self::default(),
            Err(err) => {
                tracing::warn!(error = %err, "bridge prefs unreadable, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;

    #[test]
    fn partial_prefs_fill_defaults() {
        let store = MemoryConfigStore::with_raw(BRIDGE_PREFS_KEY, r#"{"sync": {"trace_changes": true}}"#);
        let prefs = BridgePrefs::load_or_default(&ConfigService::new(store));
        assert!(prefs.sync.trace_changes);
        assert!(prefs.sync.sweep_inline_on_create);
        assert_eq!(prefs.display, DisplayOptions::default());
    }

    #[test]
    fn corrupt_prefs_fall_back() {
        let store = MemoryConfigStore::with_raw(BRIDGE_PREFS_KEY, "not json");
        assert_eq!(
            BridgePrefs::load_or_default(&ConfigService::new(store)),
            BridgePrefs::default()
        );
    }

    #[test]
    fn prefs_round_trip_through_service() {
        let service = ConfigService::new(MemoryConfigStore::new());
        let mut prefs = BridgePrefs::default();
        prefs.display.cad_width = 1024;
        service.save(BRIDGE_PREFS_KEY, &prefs).unwrap();
        assert_eq!(BridgePrefs::load_or_default(&service), prefs);
    }
}
