//! Browse connection lifecycle
//!
//! ```text
//! Disconnected ──request(E)──► Connecting(E) ──Connected──► Connected(E, s)
//!                                   │                             │
//!                                 Failed                      Suspended
//!                                   ▼                             ▼
//!                               Failed(E)                    Suspended(E)
//!
//! any state ──request(E' ≠ E)──► disconnect(E), Connecting(E')
//! any state ──request(None)────► disconnect(E), Disconnected
//! ```
//!
//! Every attempt gets an `AttemptToken`. Results are matched against the
//! token of the live attempt, so a late result for a superseded attempt
//! is discarded even if it names the same endpoint.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use node_graph::Node;
use tracing::{debug, info, warn};

use crate::collaborator::MediaSessionSubsystem;
use crate::inbox::{EngineEvent, EventSender};
use crate::model::{EndpointId, SessionToken};

/// State of the browse connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting(EndpointId),
    Connected {
        endpoint: EndpointId,
        session: SessionToken,
    },
    Suspended(EndpointId),
    Failed(EndpointId),
}

impl ConnectionState {
    /// Endpoint this state refers to, if any
    pub fn endpoint(&self) -> Option<&EndpointId> {
        match self {
            ConnectionState::Disconnected => None,
            ConnectionState::Connecting(endpoint)
            | ConnectionState::Suspended(endpoint)
            | ConnectionState::Failed(endpoint) => Some(endpoint),
            ConnectionState::Connected { endpoint, .. } => Some(endpoint),
        }
    }

    /// Session of an established connection
    pub fn session(&self) -> Option<&SessionToken> {
        match self {
            ConnectionState::Connected { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting(_) => "connecting",
            ConnectionState::Connected { .. } => "connected",
            ConnectionState::Suspended(_) => "suspended",
            ConnectionState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.endpoint() {
            Some(endpoint) => write!(f, "{}({})", self.name(), endpoint),
            None => f.write_str(self.name()),
        }
    }
}

/// Identity of one connection attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttemptToken {
    pub endpoint: EndpointId,
    pub serial: u64,
}

/// What the subsystem reports about an attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected(SessionToken),
    Failed(String),
    /// An established connection dropped
    Suspended,
}

/// Drives the browse connection for the selected endpoint
///
/// At most one attempt is live at a time. The machine must be used from
/// the engine's owning context; subsystem listeners only post
/// `EngineEvent::Connection` to the inbox.
pub struct ConnectionMachine {
    subsystem: Rc<dyn MediaSessionSubsystem>,
    events: EventSender,
    state: Node<ConnectionState>,
    live: RefCell<Option<AttemptToken>>,
    next_serial: Cell<u64>,
    retry_failed: bool,
    disconnect_suspended: bool,
}

impl ConnectionMachine {
    pub fn new(subsystem: Rc<dyn MediaSessionSubsystem>, events: EventSender) -> Self {
        Self {
            subsystem,
            events,
            state: Node::with_value(ConnectionState::Disconnected).with_label("connection_state"),
            live: RefCell::new(None),
            next_serial: Cell::new(0),
            retry_failed: true,
            disconnect_suspended: true,
        }
    }

    /// Whether re-requesting a failed endpoint starts a new attempt
    pub fn with_retry_failed(mut self, retry: bool) -> Self {
        self.retry_failed = retry;
        self
    }

    /// Whether a suspended endpoint is disconnected before moving on
    pub fn with_disconnect_suspended(mut self, disconnect: bool) -> Self {
        self.disconnect_suspended = disconnect;
        self
    }

    /// Published connection state
    pub fn state(&self) -> Node<ConnectionState> {
        self.state.clone()
    }

    pub fn current(&self) -> ConnectionState {
        self.state.get().unwrap_or_default()
    }

    /// Token of the live attempt, if any
    pub fn live_attempt(&self) -> Option<AttemptToken> {
        self.live.borrow().clone()
    }

    /// Connect to `endpoint`, superseding whatever was requested before
    ///
    /// `None` releases the connection. Requesting the endpoint that is
    /// already connecting or connected does nothing.
    pub fn request(&self, endpoint: Option<&EndpointId>) {
        let Some(endpoint) = endpoint else {
            self.release();
            return;
        };

        let current = self.current();
        if current.endpoint() == Some(endpoint) {
            match current {
                ConnectionState::Connecting(_) | ConnectionState::Connected { .. } => {
                    debug!(%endpoint, "Endpoint already requested");
                    return;
                }
                ConnectionState::Failed(_) if !self.retry_failed => {
                    debug!(%endpoint, "Not retrying failed endpoint");
                    return;
                }
                _ => {}
            }
        }

        self.tear_down(&current);
        self.start(endpoint);
    }

    /// Disconnect the live attempt, if any, and enter `Disconnected`
    pub fn release(&self) {
        let current = self.current();
        self.tear_down(&current);
        self.state.set(ConnectionState::Disconnected);
    }

    /// Apply a subsystem event for `attempt`
    ///
    /// Returns `true` if the event changed the state. Events for any
    /// attempt other than the live one are stale and dropped.
    pub fn handle(&self, attempt: &AttemptToken, event: ConnectionEvent) -> bool {
        if self.live.borrow().as_ref() != Some(attempt) {
            debug!(
                endpoint = %attempt.endpoint,
                serial = attempt.serial,
                "Discarding event for superseded connection attempt"
            );
            return false;
        }

        let next = match (event, self.current()) {
            (ConnectionEvent::Connected(session), ConnectionState::Connecting(endpoint)) => {
                info!(%endpoint, %session, "Browse connection established");
                ConnectionState::Connected { endpoint, session }
            }
            (ConnectionEvent::Failed(reason), ConnectionState::Connecting(endpoint)) => {
                warn!(%endpoint, %reason, "Browse connection failed");
                self.live.replace(None);
                ConnectionState::Failed(endpoint)
            }
            (ConnectionEvent::Suspended, ConnectionState::Connected { endpoint, .. }) => {
                warn!(%endpoint, "Browse connection suspended");
                ConnectionState::Suspended(endpoint)
            }
            (event, state) => {
                debug!(?event, %state, "Ignoring connection event not valid in current state");
                return false;
            }
        };

        self.state.set(next);
        true
    }

    fn tear_down(&self, current: &ConnectionState) {
        self.live.replace(None);
        let endpoint = match current {
            ConnectionState::Connecting(endpoint) | ConnectionState::Connected { endpoint, .. } => {
                endpoint
            }
            ConnectionState::Suspended(endpoint) if self.disconnect_suspended => endpoint,
            _ => return,
        };
        debug!(%endpoint, "Disconnecting browse endpoint");
        self.subsystem.disconnect(endpoint);
    }

    fn start(&self, endpoint: &EndpointId) {
        let serial = self.next_serial.get() + 1;
        self.next_serial.set(serial);
        let token = AttemptToken {
            endpoint: endpoint.clone(),
            serial,
        };
        self.live.replace(Some(token.clone()));
        self.state.set(ConnectionState::Connecting(endpoint.clone()));

        debug!(%endpoint, serial, "Connecting to browse endpoint");
        let events = self.events.clone();
        self.subsystem.connect(
            endpoint,
            Arc::new(move |event| {
                events.send(EngineEvent::Connection {
                    attempt: token.clone(),
                    event,
                });
            }),
        );
    }
}

impl fmt::Debug for ConnectionMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMachine")
            .field("state", &self.current())
            .field("live", &self.live.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::EventInbox;
    use crate::testing::RecordingSubsystem;

    fn machine() -> (ConnectionMachine, Rc<RecordingSubsystem>, EventInbox) {
        let recorder = Rc::new(RecordingSubsystem::default());
        let (sender, inbox) = EventInbox::channel();
        let machine = ConnectionMachine::new(recorder.clone(), sender);
        (machine, recorder, inbox)
    }

    fn endpoint(name: &str) -> EndpointId {
        EndpointId::new(name)
    }

    #[test]
    fn test_initial_state_is_disconnected() {
        let (machine, _, _) = machine();
        assert_eq!(machine.current(), ConnectionState::Disconnected);
        assert!(machine.live_attempt().is_none());
    }

    #[test]
    fn test_request_then_connected() {
        let (machine, recorder, _) = machine();
        machine.request(Some(&endpoint("radio/.Browse")));
        assert_eq!(
            machine.current(),
            ConnectionState::Connecting(endpoint("radio/.Browse"))
        );

        let attempt = machine.live_attempt().unwrap();
        assert!(machine.handle(&attempt, ConnectionEvent::Connected(SessionToken::new("s1"))));

        assert_eq!(machine.current().session(), Some(&SessionToken::new("s1")));
        assert_eq!(*recorder.connects.borrow(), vec![endpoint("radio/.Browse")]);
    }

    #[test]
    fn test_superseded_success_is_discarded() {
        let (machine, recorder, _) = machine();
        machine.request(Some(&endpoint("e")));
        let first = machine.live_attempt().unwrap();
        machine.request(Some(&endpoint("e-prime")));

        let accepted = machine.handle(&first, ConnectionEvent::Connected(SessionToken::new("late")));

        assert!(!accepted);
        assert_eq!(machine.current(), ConnectionState::Connecting(endpoint("e-prime")));
        assert_eq!(*recorder.disconnects.borrow(), vec![endpoint("e")]);
    }

    #[test]
    fn test_stale_attempt_for_same_endpoint_is_discarded() {
        let (machine, _, _) = machine();
        machine.request(Some(&endpoint("e")));
        let first = machine.live_attempt().unwrap();
        machine.request(None);
        machine.request(Some(&endpoint("e")));

        assert!(!machine.handle(&first, ConnectionEvent::Connected(SessionToken::new("old"))));
        assert_eq!(machine.current(), ConnectionState::Connecting(endpoint("e")));
    }

    #[test]
    fn test_failure_then_retry() {
        let (machine, recorder, _) = machine();
        machine.request(Some(&endpoint("e")));
        let attempt = machine.live_attempt().unwrap();
        machine.handle(&attempt, ConnectionEvent::Failed("unreachable".into()));
        assert_eq!(machine.current(), ConnectionState::Failed(endpoint("e")));

        machine.request(Some(&endpoint("e")));

        assert_eq!(machine.current(), ConnectionState::Connecting(endpoint("e")));
        assert_eq!(recorder.connects.borrow().len(), 2);
        assert!(recorder.disconnects.borrow().is_empty());
    }

    #[test]
    fn test_failed_endpoint_not_retried_when_disabled() {
        let (machine, recorder, _) = machine();
        let machine = machine.with_retry_failed(false);
        machine.request(Some(&endpoint("e")));
        let attempt = machine.live_attempt().unwrap();
        machine.handle(&attempt, ConnectionEvent::Failed("refused".into()));

        machine.request(Some(&endpoint("e")));

        assert_eq!(machine.current(), ConnectionState::Failed(endpoint("e")));
        assert_eq!(recorder.connects.borrow().len(), 1);
    }

    #[test]
    fn test_suspended_then_retry() {
        let (machine, recorder, _) = machine();
        machine.request(Some(&endpoint("e")));
        let attempt = machine.live_attempt().unwrap();
        machine.handle(&attempt, ConnectionEvent::Connected(SessionToken::new("s")));
        machine.handle(&attempt, ConnectionEvent::Suspended);
        assert_eq!(machine.current(), ConnectionState::Suspended(endpoint("e")));

        machine.request(Some(&endpoint("e")));

        assert_eq!(machine.current(), ConnectionState::Connecting(endpoint("e")));
        assert_eq!(*recorder.disconnects.borrow(), vec![endpoint("e")]);
        assert_eq!(recorder.connects.borrow().len(), 2);
    }

    #[test]
    fn test_same_endpoint_request_is_noop() {
        let (machine, recorder, _) = machine();
        machine.request(Some(&endpoint("e")));
        machine.request(Some(&endpoint("e")));

        assert_eq!(recorder.connects.borrow().len(), 1);
        assert!(recorder.disconnects.borrow().is_empty());
    }

    #[test]
    fn test_release_disconnects() {
        let (machine, recorder, _) = machine();
        machine.request(Some(&endpoint("e")));
        let attempt = machine.live_attempt().unwrap();
        machine.handle(&attempt, ConnectionEvent::Connected(SessionToken::new("s")));

        machine.request(None);

        assert_eq!(machine.current(), ConnectionState::Disconnected);
        assert_eq!(*recorder.disconnects.borrow(), vec![endpoint("e")]);
        assert!(!machine.handle(&attempt, ConnectionEvent::Suspended));
    }

    #[test]
    fn test_connected_only_accepted_while_connecting() {
        let (machine, _, _) = machine();
        machine.request(Some(&endpoint("e")));
        let attempt = machine.live_attempt().unwrap();
        machine.handle(&attempt, ConnectionEvent::Connected(SessionToken::new("s1")));

        assert!(!machine.handle(&attempt, ConnectionEvent::Connected(SessionToken::new("s2"))));
        assert_eq!(machine.current().session(), Some(&SessionToken::new("s1")));
    }

    #[test]
    fn test_listener_posts_to_inbox() {
        let (machine, recorder, inbox) = machine();
        machine.request(Some(&endpoint("e")));

        recorder.resolve(&endpoint("e"), ConnectionEvent::Connected(SessionToken::new("s")));

        // Nothing is applied until the event is drained
        assert_eq!(machine.current(), ConnectionState::Connecting(endpoint("e")));

        match inbox.try_recv() {
            Some(EngineEvent::Connection { attempt, event }) => {
                assert!(machine.handle(&attempt, event));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(machine.current().is_connected());
    }
}
