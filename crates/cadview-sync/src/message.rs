// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Messages exchanged with the remote model and the outbound channel port.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SyncError;

/// A custom method-call request.
///
/// `method` is a JSON-encoded path whose last element is the method name;
/// `args` is a JSON-encoded argument list, or absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Correlation id; when present exactly one `method_result` is sent back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// JSON path, e.g. `["viewer", "camera", "presetCamera"]`.
    pub method: String,
    /// JSON argument list, e.g. `["iso"]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
}

/// Message received from the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// One or more remote property changes.
    Update {
        /// Changed keys with their new values, in change order.
        changes: Map<String, Value>,
    },
    /// Remote method invocation.
    #[serde(rename = "cad_viewer_method")]
    Method(MethodCall),
}

impl InboundMessage {
    /// Parse a JSON frame.
    pub fn from_json(text: &str) -> Result<Self, SyncError> {
        serde_json::from_str(text).map_err(|e| SyncError::Message(e.to_string()))
    }

    /// Single-key update, the common case.
    pub fn update(key: &str, value: Value) -> Self {
        let mut changes = Map::new();
        changes.insert(key.to_owned(), value);
        InboundMessage::Update { changes }
    }
}

/// Message sent to the remote side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Batched property updates (one flush).
    Update {
        /// Changed keys with their new values.
        changes: Map<String, Value>,
    },
    /// Reply to a method call that carried an id.
    MethodResult {
        /// Id of the originating call.
        id: u64,
        /// JSON-serializable result, or `{"error": ...}`.
        result: Value,
    },
}

impl OutboundMessage {
    /// Encode as a JSON frame.
    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(|e| SyncError::Message(e.to_string()))
    }
}

/// Outbound half of the remote property channel.
///
/// Delivery is assumed ordered; a send to a closed peer is logged and dropped.
pub trait RemoteChannel {
    /// Queue one message for the remote side.
    fn send(&mut self, message: OutboundMessage);
}

impl RemoteChannel for Vec<OutboundMessage> {
    fn send(&mut self, message: OutboundMessage) {
        self.push(message);
    }
}

impl RemoteChannel for std::sync::mpsc::Sender<OutboundMessage> {
    fn send(&mut self, message: OutboundMessage) {
        if std::sync::mpsc::Sender::send(self, message).is_err() {
            tracing::warn!("remote channel closed; outbound message dropped");
        }
    }
}

impl RemoteChannel for tokio::sync::mpsc::UnboundedSender<OutboundMessage> {
    fn send(&mut self, message: OutboundMessage) {
        if tokio::sync::mpsc::UnboundedSender::send(self, message).is_err() {
            tracing::warn!("remote channel closed; outbound message dropped");
        }
    }
}
