// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-facing inbound adapters: a handler trait, a drainable port trait and
//! a channel-backed port for hosts that poll once per UI tick.

use std::sync::mpsc::{Receiver, TryRecvError};

use crate::message::InboundMessage;

/// Consumer of inbound messages (a sync engine).
pub trait InboundHandler {
    /// Process one message. Must not fail; errors are logged by the handler.
    fn handle(&mut self, message: InboundMessage);
    /// Whether the handler accepts no further messages.
    fn is_closed(&self) -> bool;
}

/// Abstract source of inbound messages.
pub trait InboundPort {
    /// Drain up to `max` messages that are already waiting.
    fn drain_inbound(&mut self, max: usize) -> Vec<InboundMessage>;
    /// Drop the underlying stream.
    fn close(&mut self);
}

/// Channel-backed inbound port.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    rx: Option<Receiver<InboundMessage>>,
}

impl ChannelTransport {
    /// A port with no stream installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// A port draining `rx`.
    pub fn with_receiver(rx: Receiver<InboundMessage>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Install (or replace) the underlying receiver.
    pub fn set_receiver(&mut self, rx: Receiver<InboundMessage>) {
        self.rx = Some(rx);
    }

    /// Whether a live receiver is installed.
    pub fn is_connected(&self) -> bool {
        self.rx.is_some()
    }
}

impl InboundPort for ChannelTransport {
    fn drain_inbound(&mut self, max: usize) -> Vec<InboundMessage> {
        let mut out = Vec::new();
        let mut disconnected = false;
        if let Some(rx) = &self.rx {
            for _ in 0..max {
                match rx.try_recv() {
                    Ok(message) => out.push(message),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }
        if disconnected {
            tracing::debug!("inbound channel disconnected");
            self.rx = None;
        }
        out
    }

    fn close(&mut self) {
        self.rx = None;
    }
}

/// Feed up to `max` waiting messages from `port` to `handler`.
///
/// Stops early once the handler closes; returns the number handled.
pub fn pump<H, P>(handler: &mut H, port: &mut P, max: usize) -> usize
where
    H: InboundHandler + ?Sized,
    P: InboundPort + ?Sized,
{
    if handler.is_closed() {
        return 0;
    }
    let mut handled = 0;
    for message in port.drain_inbound(max) {
        handler.handle(message);
        handled += 1;
        if handler.is_closed() {
            port.close();
            break;
        }
    }
    handled
}
