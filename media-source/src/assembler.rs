//! Combined playback snapshot assembly
//!
//! Every bind starts a new generation. Callbacks registered for a binding
//! capture that generation when they are created; an update is merged only
//! if its generation is still the current one. A published snapshot is
//! never modified, each accepted update publishes a fresh copy.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use node_graph::Node;
use tracing::{debug, trace};

use crate::collaborator::{CallbackId, MediaSessionSubsystem};
use crate::inbox::{EngineEvent, EventSender};
use crate::model::{
    CallbackKind, CombinedPlaybackSnapshot, ControllerHandle, ControllerUpdate, Generation,
};

struct Binding {
    controller: Option<ControllerHandle>,
    generation: Generation,
    registrations: Vec<(CallbackKind, CallbackId)>,
    snapshot: Node<Arc<CombinedPlaybackSnapshot>>,
}

/// Binds controller callbacks and publishes snapshots for the bound controller
pub struct SnapshotAssembler {
    subsystem: Rc<dyn MediaSessionSubsystem>,
    events: EventSender,
    generation: Cell<Generation>,
    binding: RefCell<Option<Binding>>,
}

impl SnapshotAssembler {
    pub fn new(subsystem: Rc<dyn MediaSessionSubsystem>, events: EventSender) -> Self {
        Self {
            subsystem,
            events,
            generation: Cell::new(Generation::INITIAL),
            binding: RefCell::new(None),
        }
    }

    /// Generation of the current binding
    pub fn generation(&self) -> Generation {
        self.generation.get()
    }

    /// Controller of the current binding
    pub fn controller(&self) -> Option<ControllerHandle> {
        self.binding
            .borrow()
            .as_ref()
            .and_then(|binding| binding.controller.clone())
    }

    /// Bind to `controller`, replacing the previous binding
    ///
    /// The callbacks of the previous binding are unregistered before any
    /// callback is registered on the new controller. The returned node is
    /// seeded from what the controller holds right now.
    pub fn bind(&self, controller: Option<&ControllerHandle>) -> Node<Arc<CombinedPlaybackSnapshot>> {
        let generation = self.advance();

        let (initial, registrations) = match controller {
            Some(controller) => {
                let registrations = CallbackKind::ALL
                    .iter()
                    .map(|&kind| (kind, self.register(controller, kind, generation)))
                    .collect();
                (
                    CombinedPlaybackSnapshot::read_from(controller, generation),
                    registrations,
                )
            }
            None => (CombinedPlaybackSnapshot::empty(generation), Vec::new()),
        };

        debug!(
            %generation,
            session = controller.map(|c| c.session_token().as_str()),
            "Bound playback snapshot"
        );

        let snapshot = Node::with_value(Arc::new(initial)).with_label("bound_snapshot");
        self.binding.replace(Some(Binding {
            controller: controller.cloned(),
            generation,
            registrations,
            snapshot: snapshot.clone(),
        }));
        snapshot
    }

    /// Drop the current binding and invalidate its pending updates
    pub fn unbind(&self) {
        self.advance();
    }

    /// Merge `update` into the snapshot of `generation`
    ///
    /// Returns `false` for an update from a superseded binding.
    pub fn accept(&self, generation: Generation, update: ControllerUpdate) -> bool {
        if generation != self.generation.get() {
            trace!(%generation, current = %self.generation.get(), "Discarding stale controller update");
            return false;
        }

        let snapshot = match self.binding.borrow().as_ref() {
            Some(binding) if binding.generation == generation => binding.snapshot.clone(),
            _ => return false,
        };

        let Some(current) = snapshot.get() else {
            return false;
        };
        trace!(%generation, kind = ?update.kind(), "Merging controller update");
        snapshot.set(Arc::new(current.with_update(update)));
        true
    }

    /// Bump the generation and release the current binding's callbacks
    fn advance(&self) -> Generation {
        let generation = self.generation.get().next();
        self.generation.set(generation);

        let previous = self.binding.borrow_mut().take();
        if let Some(previous) = previous {
            if let Some(controller) = &previous.controller {
                for (kind, id) in previous.registrations {
                    self.subsystem.unregister_callback(controller, kind, id);
                }
            }
        }
        generation
    }

    fn register(
        &self,
        controller: &ControllerHandle,
        kind: CallbackKind,
        generation: Generation,
    ) -> CallbackId {
        let events = self.events.clone();
        self.subsystem.register_callback(
            controller,
            kind,
            Arc::new(move |update| {
                events.send(EngineEvent::Controller { generation, update });
            }),
        )
    }
}

impl fmt::Debug for SnapshotAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotAssembler")
            .field("generation", &self.generation.get())
            .field("controller", &self.controller())
            .finish()
    }
}
