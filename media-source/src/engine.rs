//! The engine facade
//!
//! ```text
//! selection store ──► selected_source ──┬──► selected_endpoint ──► ConnectionMachine
//!                                       │                              │
//!                                       │                      connection_state
//!                                       │                              │
//!                                       │                      connected_session
//!                                       │                              │
//! active_controllers ──┬──► controller_from_active      controller_from_browser
//!                      │               └──────── coalesce ─────────┘
//!                      │                            │
//!                      │                       controller ──switch_map──► SnapshotAssembler
//!                      │                                                        │
//!                      └──► top_active_controller                           snapshot
//!                                                          metadata, playback_status, queue, has_queue
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use node_graph::{coalesce_prefer_first, combine, map, switch_map, Node, ReadNode, Subscription};
use tracing::{debug, info};

use crate::assembler::SnapshotAssembler;
use crate::collaborator::{ListenerId, MediaSessionSubsystem, SelectionStore};
use crate::config::EngineConfig;
use crate::connection::{ConnectionMachine, ConnectionState};
use crate::error::{EngineError, Result};
use crate::inbox::{EngineEvent, EventInbox, EventSender};
use crate::model::{
    CombinedPlaybackSnapshot, ControllerHandle, EndpointId, Generation, MediaMetadata,
    MediaSourceHandle, PlaybackStatus, QueueItem, SessionToken,
};
use crate::selector::ActiveItemSelector;

/// Reactive view of the selected media source and what it is playing
///
/// The engine lives on one context (it is not `Send`). Collaborators that
/// deliver results from other threads go through [`EventSender`]; the
/// owning context applies them with [`dispatch_pending`](Self::dispatch_pending).
///
/// Published nodes are handed out as [`ReadNode`]s. Only the engine writes
/// them:
///
/// ```compile_fail
/// use media_source::MediaSourceEngine;
///
/// fn force_queue_button(engine: &MediaSourceEngine) {
///     engine.has_queue().set(true);
/// }
/// ```
///
/// ```compile_fail
/// use media_source::{MediaSourceEngine, MediaSourceHandle};
///
/// fn bypass_store(engine: &MediaSourceEngine) {
///     engine.selected_source().set(Some(MediaSourceHandle::new("com.example.radio")));
/// }
/// ```
///
/// # Example
///
/// ```rust,ignore
/// let engine = MediaSourceEngine::new(EngineConfig::default(), store, subsystem)?;
///
/// let _sub = engine.snapshot().observe(|snapshot| {
///     println!("{:?} playing: {}", snapshot.package_name(), snapshot.is_playing());
/// });
///
/// loop {
///     engine.dispatch_with_timeout(Duration::from_millis(100));
/// }
/// ```
pub struct MediaSourceEngine {
    config: EngineConfig,
    store: Arc<dyn SelectionStore>,
    machine: Rc<ConnectionMachine>,
    assembler: Rc<SnapshotAssembler>,
    sender: EventSender,
    inbox: EventInbox,
    closed: Rc<Cell<bool>>,
    subscriptions: RefCell<Vec<Subscription>>,
    store_listener: ListenerId,
    /// Endpoint change waiting to be handed to the connection machine
    pending_request: Rc<RefCell<Option<Option<EndpointId>>>>,

    selected_source: Node<Option<MediaSourceHandle>>,
    selected_endpoint: Node<Option<EndpointId>>,
    connected_session: Node<Option<SessionToken>>,
    controller: Node<Option<ControllerHandle>>,
    top_active_controller: Node<Option<ControllerHandle>>,
    snapshot: Node<Arc<CombinedPlaybackSnapshot>>,
    metadata: Node<Option<MediaMetadata>>,
    playback_status: Node<Option<PlaybackStatus>>,
    queue: Node<Option<Vec<QueueItem>>>,
    has_queue: Node<bool>,
    is_selected_source_playing: Node<bool>,
}

impl MediaSourceEngine {
    /// Build the node graph and, unless deferred, connect to the selected source
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SelectionStore>,
        subsystem: Rc<dyn MediaSessionSubsystem>,
    ) -> Result<Self> {
        config.validate()?;

        let (sender, inbox) = EventInbox::channel();
        let closed = Rc::new(Cell::new(false));

        let machine = Rc::new(
            ConnectionMachine::new(Rc::clone(&subsystem), sender.clone())
                .with_retry_failed(config.retry_failed_on_reselect)
                .with_disconnect_suspended(config.disconnect_suspended_on_switch),
        );
        let assembler = Rc::new(SnapshotAssembler::new(Rc::clone(&subsystem), sender.clone()));

        let selected_source: Node<Option<MediaSourceHandle>> = if config.connect_on_start {
            Node::with_value(store.current())
        } else {
            Node::new()
        };
        let selected_source = selected_source.with_label("selected_source");

        let active = subsystem.active_controllers();

        let selected_endpoint = map(&selected_source, |source| {
            source.as_ref().and_then(|s| s.browse_endpoint.clone())
        })
        .with_label("selected_endpoint");

        let controller_from_active = combine(&active, &selected_source, |list, source| {
            ActiveItemSelector::controller_for_source(list, source.as_ref())
        })
        .with_label("controller_from_active");

        let connected_session = map(&machine.state(), |state| state.session().cloned())
            .with_label("connected_session");

        let controller_from_browser = {
            let subsystem = Rc::clone(&subsystem);
            map(&connected_session, move |session| {
                session.as_ref().and_then(|token| subsystem.controller_for(token))
            })
            .with_label("controller_from_browser")
        };

        let controller = coalesce_prefer_first(&controller_from_active, &controller_from_browser)
            .with_label("controller");

        let snapshot = {
            let assembler = Rc::clone(&assembler);
            let closed = Rc::clone(&closed);
            switch_map(&controller, move |controller| {
                if closed.get() {
                    assembler.bind(None)
                } else {
                    assembler.bind(controller.as_ref())
                }
            })
            .with_label("snapshot")
        };

        let metadata = map(&snapshot, |s| s.metadata.clone()).with_label("metadata");
        let playback_status =
            map(&snapshot, |s| s.playback_status.clone()).with_label("playback_status");
        let queue = map(&snapshot, |s| s.queue.clone()).with_label("queue");
        let has_queue = map(&snapshot, |s| s.has_queue()).with_label("has_queue");

        let top_active_controller = ActiveItemSelector::top_active(&active);
        let is_selected_source_playing =
            combine(&top_active_controller, &selected_source, |top, selected| {
                match (top, selected) {
                    (Some(top), Some(selected)) => top.package_name() == &selected.package,
                    _ => false,
                }
            })
            .with_label("is_selected_source_playing");

        // The machine is driven once the selection change has settled, so
        // nothing downstream of the connection state sees a stale selection.
        let pending_request = Rc::new(RefCell::new(None));
        let request = {
            let pending = Rc::clone(&pending_request);
            selected_endpoint.observe(move |endpoint| {
                *pending.borrow_mut() = Some(endpoint.clone());
            })
        };

        let store_listener = {
            let sender = sender.clone();
            store.on_change(Box::new(move || {
                sender.send(EngineEvent::SelectionChanged);
            }))
        };

        let initial = selected_source.get().flatten();
        info!(
            source = initial.as_ref().map(MediaSourceHandle::name),
            deferred = !config.connect_on_start,
            "Media source engine started"
        );

        let engine = Self {
            config,
            store,
            machine,
            assembler,
            sender,
            inbox,
            closed,
            subscriptions: RefCell::new(vec![request]),
            store_listener,
            pending_request,
            selected_source,
            selected_endpoint,
            connected_session,
            controller,
            top_active_controller,
            snapshot,
            metadata,
            playback_status,
            queue,
            has_queue,
            is_selected_source_playing,
        };
        engine.flush_request();
        Ok(engine)
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Persist `source` as the selection and apply it right away
    pub fn select(&self, source: &MediaSourceHandle) -> Result<()> {
        if self.closed.get() {
            return Err(EngineError::ShutDown);
        }
        self.store.select(source)?;
        self.refresh_selection();
        Ok(())
    }

    /// Re-read the selection store into `selected_source`
    pub fn refresh_selection(&self) {
        if self.closed.get() {
            return;
        }
        let current = self.store.current();
        debug!(
            source = current.as_ref().map(MediaSourceHandle::name),
            "Applying selection"
        );
        self.selected_source.set(current);
        self.flush_request();
    }

    /// Handle for posting events from other threads
    pub fn event_sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Apply queued events without blocking
    ///
    /// At most `dispatch_batch_limit` events are applied per call. Returns
    /// the number applied.
    pub fn dispatch_pending(&self) -> usize {
        if self.closed.get() {
            return 0;
        }
        self.drain(self.config.dispatch_batch_limit)
    }

    /// Wait up to `timeout` for an event, then apply what is queued
    pub fn dispatch_with_timeout(&self, timeout: Duration) -> usize {
        if self.closed.get() {
            return 0;
        }
        match self.inbox.recv_timeout(timeout) {
            Some(event) => {
                self.apply(event);
                1 + self.drain(self.config.dispatch_batch_limit - 1)
            }
            None => 0,
        }
    }

    /// Release the connection and controller callbacks
    ///
    /// Queued and later events are ignored. Further selection changes are
    /// not applied.
    pub fn shutdown(&self) {
        if self.closed.replace(true) {
            return;
        }
        self.subscriptions.borrow_mut().clear();
        self.pending_request.borrow_mut().take();
        self.store.remove_listener(self.store_listener);
        self.machine.release();
        self.assembler.unbind();
        info!("Media source engine shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.get()
    }

    fn apply(&self, event: EngineEvent) {
        if self.closed.get() {
            return;
        }
        match event {
            EngineEvent::SelectionChanged => self.refresh_selection(),
            EngineEvent::Connection { attempt, event } => {
                self.machine.handle(&attempt, event);
            }
            EngineEvent::Controller { generation, update } => {
                self.assembler.accept(generation, update);
            }
        }
    }

    /// Hand a settled endpoint change to the connection machine
    fn flush_request(&self) {
        let pending = self.pending_request.borrow_mut().take();
        if let Some(endpoint) = pending {
            self.machine.request(endpoint.as_ref());
        }
    }

    fn drain(&self, limit: usize) -> usize {
        let mut applied = 0;
        while applied < limit {
            let Some(event) = self.inbox.try_recv() else {
                break;
            };
            self.apply(event);
            applied += 1;
        }
        applied
    }

    // ========================================================================
    // Published nodes
    // ========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn selected_source(&self) -> ReadNode<Option<MediaSourceHandle>> {
        self.selected_source.read_only()
    }

    pub fn selected_endpoint(&self) -> ReadNode<Option<EndpointId>> {
        self.selected_endpoint.read_only()
    }

    pub fn connection_state(&self) -> ReadNode<ConnectionState> {
        self.machine.state().read_only()
    }

    pub fn connected_session(&self) -> ReadNode<Option<SessionToken>> {
        self.connected_session.read_only()
    }

    /// Controller for the selected source
    ///
    /// An active controller of the selected source wins over the controller
    /// obtained through the browse connection.
    pub fn controller(&self) -> ReadNode<Option<ControllerHandle>> {
        self.controller.read_only()
    }

    /// Most relevant active controller, regardless of selection
    pub fn top_active_controller(&self) -> ReadNode<Option<ControllerHandle>> {
        self.top_active_controller.read_only()
    }

    pub fn snapshot(&self) -> ReadNode<Arc<CombinedPlaybackSnapshot>> {
        self.snapshot.read_only()
    }

    pub fn metadata(&self) -> ReadNode<Option<MediaMetadata>> {
        self.metadata.read_only()
    }

    pub fn playback_status(&self) -> ReadNode<Option<PlaybackStatus>> {
        self.playback_status.read_only()
    }

    pub fn queue(&self) -> ReadNode<Option<Vec<QueueItem>>> {
        self.queue.read_only()
    }

    /// True iff the queue is present and non-empty
    pub fn has_queue(&self) -> ReadNode<bool> {
        self.has_queue.read_only()
    }

    /// True iff the top active controller belongs to the selected source
    pub fn is_selected_source_playing(&self) -> ReadNode<bool> {
        self.is_selected_source_playing.read_only()
    }

    /// Generation of the current controller binding
    pub fn generation(&self) -> Generation {
        self.assembler.generation()
    }
}

impl Drop for MediaSourceEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection_store::InMemorySelectionStore;
    use crate::testing::RecordingSubsystem;

    fn radio() -> MediaSourceHandle {
        MediaSourceHandle::browsable("com.example.radio", "com.example.radio/.Browse")
    }

    fn setup(config: EngineConfig) -> (MediaSourceEngine, InMemorySelectionStore, Rc<RecordingSubsystem>) {
        let store = InMemorySelectionStore::with_sources(vec![radio()]);
        let subsystem = Rc::new(RecordingSubsystem::default());
        let engine =
            MediaSourceEngine::new(config, Arc::new(store.clone()), subsystem.clone()).unwrap();
        (engine, store, subsystem)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            dispatch_batch_limit: 0,
            ..Default::default()
        };
        let store = Arc::new(InMemorySelectionStore::new());
        let result = MediaSourceEngine::new(config, store, Rc::new(RecordingSubsystem::default()));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_select_connects_to_endpoint() {
        let (engine, _store, subsystem) = setup(EngineConfig::default());
        assert!(subsystem.connects.borrow().is_empty());

        engine.select(&radio()).unwrap();

        assert_eq!(
            *subsystem.connects.borrow(),
            vec![EndpointId::new("com.example.radio/.Browse")]
        );
        assert_eq!(
            engine.connection_state().get(),
            Some(ConnectionState::Connecting(EndpointId::new(
                "com.example.radio/.Browse"
            )))
        );
    }

    #[test]
    fn test_deferred_engine_waits_for_selection_event() {
        let (engine, store, subsystem) = setup(EngineConfig::deferred());
        assert!(!engine.selected_source().is_set());

        store.select(&radio()).unwrap();
        assert!(subsystem.connects.borrow().is_empty());

        assert_eq!(engine.dispatch_pending(), 1);
        assert_eq!(subsystem.connects.borrow().len(), 1);
    }

    #[test]
    fn test_dispatch_respects_batch_limit() {
        let (engine, _store, _subsystem) = setup(EngineConfig::step_by_step());
        let sender = engine.event_sender();
        sender.send(EngineEvent::SelectionChanged);
        sender.send(EngineEvent::SelectionChanged);

        assert_eq!(engine.dispatch_pending(), 1);
        assert_eq!(engine.dispatch_pending(), 1);
        assert_eq!(engine.dispatch_pending(), 0);
    }

    #[test]
    fn test_shutdown_releases_connection() {
        let (engine, _store, subsystem) = setup(EngineConfig::default());
        engine.select(&radio()).unwrap();

        engine.shutdown();

        assert!(engine.is_shut_down());
        assert_eq!(engine.connection_state().get(), Some(ConnectionState::Disconnected));
        assert_eq!(subsystem.disconnects.borrow().len(), 1);
        assert!(matches!(engine.select(&radio()), Err(EngineError::ShutDown)));
    }
}
