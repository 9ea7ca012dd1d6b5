// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-side ports: the document holding viewer containers and the docking shell.

/// Where a named viewer is docked in the host shell.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Anchor {
    /// Right-hand side bar.
    #[default]
    Right,
    /// Main work area, with the shell-specific insert mode (e.g. `split-right`).
    Main(String),
}

impl Anchor {
    /// Insert modes the shell accepts for the main work area.
    pub const MAIN_MODES: [&'static str; 6] = [
        "split-left",
        "split-right",
        "split-top",
        "split-bottom",
        "tab-before",
        "tab-after",
    ];

    /// Parse the wire form: `right` or one of [`Anchor::MAIN_MODES`].
    pub fn from_name(value: &str) -> Option<Self> {
        if value == "right" {
            Some(Anchor::Right)
        } else {
            Self::MAIN_MODES
                .contains(&value)
                .then(|| Anchor::Main(value.to_owned()))
        }
    }
}

/// Read access to the host document that owns inline viewer containers.
pub trait HostDocument {
    /// Whether a container with this id is still attached to the document.
    fn contains_container(&self, container_id: &str) -> bool;
}

/// Attach/detach surface of the host UI shell.
pub trait ShellPort {
    /// Dock a named viewer surface.
    fn attach(&mut self, title: &str, anchor: &Anchor);
    /// Remove the docking artifact for a named viewer. No-op if absent.
    fn detach(&mut self, title: &str);
}
