// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Async event loops feeding an [`InboundHandler`] from tokio channels.
//!
//! Both loops run on a current-thread runtime (the handler is `!Send`), stop
//! when the channel closes or the handler is disposed, and never stop because
//! a single message failed.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::message::InboundMessage;
use crate::transport::InboundHandler;

/// Dispatch typed messages until the channel closes or the handler closes.
///
/// Returns the number of messages handled.
pub async fn run_event_loop<H>(
    handler: Rc<RefCell<H>>,
    mut inbound: UnboundedReceiver<InboundMessage>,
) -> usize
where
    H: InboundHandler + ?Sized,
{
    let mut handled = 0;
    while let Some(message) = inbound.recv().await {
        if dispatch(&handler, message) {
            handled += 1;
        }
        if handler.borrow().is_closed() {
            tracing::debug!(handled, "handler closed; event loop stopping");
            break;
        }
    }
    handled
}

/// Like [`run_event_loop`] over raw JSON frames; malformed frames are logged
/// and skipped.
pub async fn run_json_event_loop<H>(
    handler: Rc<RefCell<H>>,
    mut inbound: UnboundedReceiver<String>,
) -> usize
where
    H: InboundHandler + ?Sized,
{
    let mut handled = 0;
    while let Some(frame) = inbound.recv().await {
        let message = match InboundMessage::from_json(&frame) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "inbound frame skipped");
                continue;
            }
        };
        if dispatch(&handler, message) {
            handled += 1;
        }
        if handler.borrow().is_closed() {
            tracing::debug!(handled, "handler closed; event loop stopping");
            break;
        }
    }
    handled
}

fn dispatch<H: InboundHandler + ?Sized>(handler: &RefCell<H>, message: InboundMessage) -> bool {
    match handler.try_borrow_mut() {
        Ok(mut handler) if !handler.is_closed() => {
            handler.handle(message);
            true
        }
        Ok(_) => false,
        Err(_) => {
            tracing::warn!("handler busy; inbound message dropped");
            false
        }
    }
}
