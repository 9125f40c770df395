//! Marshaling boundary between collaborator threads and the engine
//!
//! Collaborators may deliver connection results and controller callbacks
//! from any thread. Those deliveries are turned into `EngineEvent`s and
//! queued on an `std::sync::mpsc` channel; the engine drains the channel on
//! its owning context and only then touches nodes.
//!
//! - Non-blocking: `try_recv()`, `try_iter()`
//! - Timeout: `recv_timeout()`

use std::sync::mpsc;
use std::time::Duration;

use tracing::trace;

use crate::connection::{AttemptToken, ConnectionEvent};
use crate::model::{ControllerUpdate, Generation};

/// Something that happened off the engine's owning context
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The selection store reported a change; re-read `current()`
    SelectionChanged,

    /// Outcome or lifecycle change of a connection attempt
    Connection {
        attempt: AttemptToken,
        event: ConnectionEvent,
    },

    /// A controller callback fired for the binding of `generation`
    Controller {
        generation: Generation,
        update: ControllerUpdate,
    },
}

/// Cloneable, thread-safe handle for posting events to the engine
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<EngineEvent>,
}

impl EventSender {
    /// Queue an event for the engine
    ///
    /// Returns `false` if the engine (and its inbox) is gone.
    pub fn send(&self, event: EngineEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::SendError(event)) => {
                trace!(?event, "Engine inbox closed, dropping event");
                false
            }
        }
    }
}

/// Receiving side of the marshaling channel, owned by the engine
pub struct EventInbox {
    rx: mpsc::Receiver<EngineEvent>,
}

impl EventInbox {
    pub fn channel() -> (EventSender, EventInbox) {
        let (tx, rx) = mpsc::channel();
        (EventSender { tx }, EventInbox { rx })
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.rx.try_recv().ok()
    }

    /// Block until the next event or timeout expires
    ///
    /// Returns `None` if the timeout expires.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Iterator over the events queued right now
    pub fn try_iter(&self) -> impl Iterator<Item = EngineEvent> + '_ {
        self.rx.try_iter()
    }
}
