// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client-side state synchronization between a remote property model and a
//! local CAD viewer.
//!
//! One [`SyncEngine`] owns one viewer instance. It mirrors the remote model,
//! applies remote changes to the viewer with tolerant equality (so lossy wire
//! round trips never start an echo loop), reports local interactions back in
//! single batched flushes, and answers a closed set of remote method calls.
//! Live engines are tracked by placement in a [`ViewerContext`].

use cadview_codec::SceneError;
use cadview_port::ViewerError;
use thiserror::Error;

pub mod driver;
pub mod engine;
pub mod invoke;
pub mod message;
pub mod model;
pub mod property;
pub mod registry;
pub mod tolerance;
pub mod tracks;
pub mod transport;

pub use driver::{run_event_loop, run_json_event_loop};
pub use engine::{placement_for, ChangeOutcome, SyncEngine, SyncState};
pub use invoke::{InvokeError, MethodRequest, PoseUpdate, RemoteMethod, Scope, UNSERIALIZABLE};
pub use message::{InboundMessage, MethodCall, OutboundMessage, RemoteChannel};
pub use model::RemoteModel;
pub use property::{ModelKey, PropertyChange, PropertyKind};
pub use registry::{
    HeadlessHost, InstanceId, ManagedViewer, NullShell, Placement, PlacementKey, SharedViewer,
    ViewerContext, ViewerRegistry,
};
pub use tolerance::{is_tol_equal, is_tol_equal_with, slices_tol_equal, DEFAULT_TOLERANCE};
pub use tracks::parse_tracks;
pub use transport::{pump, ChannelTransport, InboundHandler, InboundPort};

/// Errors raised while synchronizing a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Key outside the recognized allow-list.
    #[error("unknown property: {0}")]
    UnknownProperty(String),
    /// Value outside its declared domain; never coerced.
    #[error("invalid value for {key}: expected {expected}")]
    InvalidValue {
        /// Offending key.
        key: String,
        /// Human-readable description of the accepted domain.
        expected: &'static str,
    },
    /// Scene payload failed to decode.
    #[error(transparent)]
    Scene(#[from] SceneError),
    /// Viewer rejected an operation.
    #[error(transparent)]
    Viewer(#[from] ViewerError),
    /// Malformed message frame or payload.
    #[error("malformed message: {0}")]
    Message(String),
}
