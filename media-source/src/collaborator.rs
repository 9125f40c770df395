//! Contracts of the collaborators the engine is driven by
//!
//! The engine never talks to a platform directly. It reads the selected
//! source from a `SelectionStore` and reaches playback sessions through a
//! `MediaSessionSubsystem`. Everything handed to a collaborator (listeners,
//! callbacks) is `Send + Sync` and only enqueues an event for the engine's
//! owning context; it never touches a node.

use std::fmt;
use std::sync::Arc;

use node_graph::Node;

use crate::connection::ConnectionEvent;
use crate::error::Result;
use crate::model::{
    CallbackKind, ControllerHandle, ControllerUpdate, EndpointId, MediaSourceHandle, SessionToken,
};

/// Called by a selection store after the selection changed
pub type SelectionListener = Box<dyn Fn() + Send + Sync>;

/// Receives the outcome and later lifecycle of one connection attempt
pub type ConnectionListener = Arc<dyn Fn(ConnectionEvent) + Send + Sync>;

/// Receives the values of one registered controller callback
pub type ControllerCallback = Arc<dyn Fn(ControllerUpdate) + Send + Sync>;

/// Persisted "which source is selected"
pub trait SelectionStore: Send + Sync {
    /// Currently selected source, if any
    fn current(&self) -> Option<MediaSourceHandle>;

    /// Register a listener invoked after every selection change
    ///
    /// Listeners may be invoked from any thread. The listener stays
    /// registered until it is passed to `remove_listener`.
    fn on_change(&self, listener: SelectionListener) -> ListenerId;

    /// Stop invoking a listener registered with `on_change`
    fn remove_listener(&self, id: ListenerId);

    /// Persist `source` as the selected source
    fn select(&self, source: &MediaSourceHandle) -> Result<()>;
}

/// Identifies one listener registered on a selection store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Identifies one callback registration on a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback-{}", self.0)
    }
}

/// The platform's media session and browse subsystem
///
/// Methods are called on the engine's owning context. Listeners and
/// callbacks may be invoked from any thread, synchronously or later.
pub trait MediaSessionSubsystem {
    /// Start connecting to a browse endpoint
    ///
    /// `listener` receives `Connected` or `Failed` once, and `Suspended`
    /// if an established connection drops.
    fn connect(&self, endpoint: &EndpointId, listener: ConnectionListener);

    /// Tear down the connection (or pending attempt) to `endpoint`
    fn disconnect(&self, endpoint: &EndpointId);

    /// Controller for a session obtained through a browse connection
    fn controller_for(&self, token: &SessionToken) -> Option<ControllerHandle>;

    fn register_callback(
        &self,
        controller: &ControllerHandle,
        kind: CallbackKind,
        callback: ControllerCallback,
    ) -> CallbackId;

    fn unregister_callback(&self, controller: &ControllerHandle, kind: CallbackKind, id: CallbackId);

    /// Currently active controllers, most recently active first
    fn active_controllers(&self) -> Node<Vec<ControllerHandle>>;
}
