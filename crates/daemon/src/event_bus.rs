// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for proxy-wiring events.
//!
//! A single bounded channel consumed by one engine task keeps all proxy
//! mutations serialized. Producers never block: when the channel is full
//! the event is dropped with a warning - detected dev-server URLs are
//! rare (at most five per process), so a full channel means something is
//! already wrong.

use devtool_core::Event;
use tokio::sync::mpsc;
use tracing::warn;

/// Channel capacity. Generous for the event rates involved.
pub const EVENT_BUS_CAPACITY: usize = 64;

/// Sending half, cheap to clone into producers.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

/// Receiving half, owned by the engine task.
pub struct EventReader {
    rx: mpsc::Receiver<Event>,
}

impl EventBus {
    pub fn new() -> (Self, EventReader) {
        let (tx, rx) = mpsc::channel(EVENT_BUS_CAPACITY);
        (Self { tx }, EventReader { rx })
    }

    /// Enqueue an event without blocking. Full channel drops with a warning.
    pub fn send(&self, event: Event) {
        if let Err(e) = self.tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(event) => {
                    warn!(event = %event.log_summary(), "event bus full, dropping event");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    warn!("event bus closed, dropping event");
                }
            }
        }
    }
}

impl EventReader {
    /// Next event, or `None` when all senders are gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
