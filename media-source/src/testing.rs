//! Stand-in collaborators for unit tests

use std::cell::{Cell, RefCell};

use node_graph::Node;
use parking_lot::Mutex;

use crate::collaborator::{CallbackId, ConnectionListener, ControllerCallback, MediaSessionSubsystem};
use crate::connection::ConnectionEvent;
use crate::model::{
    CallbackKind, ControllerHandle, EndpointId, MediaController, MediaMetadata, PackageName,
    PlaybackStatus, QueueItem, SessionToken,
};

pub(crate) struct StubController {
    token: SessionToken,
    package: PackageName,
    pub metadata: Mutex<Option<MediaMetadata>>,
    pub status: Mutex<Option<PlaybackStatus>>,
    pub queue: Mutex<Option<Vec<QueueItem>>>,
}

impl MediaController for StubController {
    fn session_token(&self) -> &SessionToken {
        &self.token
    }
    fn package_name(&self) -> &PackageName {
        &self.package
    }
    fn metadata(&self) -> Option<MediaMetadata> {
        self.metadata.lock().clone()
    }
    fn playback_status(&self) -> Option<PlaybackStatus> {
        self.status.lock().clone()
    }
    fn queue(&self) -> Option<Vec<QueueItem>> {
        self.queue.lock().clone()
    }
}

pub(crate) fn controller(token: &str, package: &str) -> ControllerHandle {
    controller_with(token, package, None, None, None)
}

pub(crate) fn controller_with(
    token: &str,
    package: &str,
    metadata: Option<MediaMetadata>,
    status: Option<PlaybackStatus>,
    queue: Option<Vec<QueueItem>>,
) -> ControllerHandle {
    ControllerHandle::new(StubController {
        token: SessionToken::new(token),
        package: PackageName::new(package),
        metadata: Mutex::new(metadata),
        status: Mutex::new(status),
        queue: Mutex::new(queue),
    })
}

pub(crate) struct Registration {
    pub session: SessionToken,
    pub kind: CallbackKind,
    pub id: CallbackId,
    pub callback: ControllerCallback,
}

/// Register/unregister calls in the order the subsystem received them
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Register(CallbackId),
    Unregister(CallbackId),
}

/// Subsystem that records every call and lets tests fire listeners later
pub(crate) struct RecordingSubsystem {
    pub connects: RefCell<Vec<EndpointId>>,
    pub disconnects: RefCell<Vec<EndpointId>>,
    pub listeners: RefCell<Vec<(EndpointId, ConnectionListener)>>,
    pub registrations: RefCell<Vec<Registration>>,
    pub unregistered: RefCell<Vec<CallbackId>>,
    pub calls: RefCell<Vec<Call>>,
    pub active: Node<Vec<ControllerHandle>>,
    next_id: Cell<u64>,
}

impl Default for RecordingSubsystem {
    fn default() -> Self {
        Self {
            connects: RefCell::default(),
            disconnects: RefCell::default(),
            listeners: RefCell::default(),
            registrations: RefCell::default(),
            unregistered: RefCell::default(),
            calls: RefCell::default(),
            active: Node::with_value(Vec::new()),
            next_id: Cell::new(0),
        }
    }
}

impl RecordingSubsystem {
    /// Report `event` to the most recent listener for `endpoint`
    pub fn resolve(&self, endpoint: &EndpointId, event: ConnectionEvent) {
        let listener = self
            .listeners
            .borrow()
            .iter()
            .rev()
            .find(|(e, _)| e == endpoint)
            .map(|(_, listener)| listener.clone());
        if let Some(listener) = listener {
            listener(event);
        }
    }

    /// Callback registered for `session`/`kind`, whether or not it was
    /// unregistered since
    pub fn callback(&self, session: &str, kind: CallbackKind) -> Option<ControllerCallback> {
        self.registrations
            .borrow()
            .iter()
            .rev()
            .find(|r| r.session.as_str() == session && r.kind == kind)
            .map(|r| r.callback.clone())
    }

    /// Registrations not yet unregistered
    pub fn live_registrations(&self) -> usize {
        let unregistered = self.unregistered.borrow();
        self.registrations
            .borrow()
            .iter()
            .filter(|r| !unregistered.contains(&r.id))
            .count()
    }
}

impl MediaSessionSubsystem for RecordingSubsystem {
    fn connect(&self, endpoint: &EndpointId, listener: ConnectionListener) {
        self.connects.borrow_mut().push(endpoint.clone());
        self.listeners.borrow_mut().push((endpoint.clone(), listener));
    }

    fn disconnect(&self, endpoint: &EndpointId) {
        self.disconnects.borrow_mut().push(endpoint.clone());
    }

    fn controller_for(&self, _token: &SessionToken) -> Option<ControllerHandle> {
        None
    }

    fn register_callback(
        &self,
        controller: &ControllerHandle,
        kind: CallbackKind,
        callback: ControllerCallback,
    ) -> CallbackId {
        let id = CallbackId::new(self.next_id.get());
        self.next_id.set(id.value() + 1);
        self.calls.borrow_mut().push(Call::Register(id));
        self.registrations.borrow_mut().push(Registration {
            session: controller.session_token().clone(),
            kind,
            id,
            callback,
        });
        id
    }

    fn unregister_callback(&self, _controller: &ControllerHandle, _kind: CallbackKind, id: CallbackId) {
        self.calls.borrow_mut().push(Call::Unregister(id));
        self.unregistered.borrow_mut().push(id);
    }

    fn active_controllers(&self) -> Node<Vec<ControllerHandle>> {
        self.active.clone()
    }
}
