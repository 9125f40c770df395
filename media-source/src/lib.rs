//! Media Source Engine
//!
//! Turns "which media source is selected" plus the asynchronous results of
//! a platform media subsystem into a few consistent, push-updated values:
//! the browse session, the controller and a combined playback snapshot.
//!
//! # Features
//!
//! - **Connection Supersession**: Selecting another source disconnects the
//!   previous endpoint, and late results for it are discarded
//! - **Consistent Snapshots**: Every snapshot holds data of one controller
//!   binding only, tagged with its generation
//! - **Stable Active Controller**: A reordered active list does not change
//!   the chosen controller
//! - **Thread Marshaling**: Collaborators post events from any thread; the
//!   engine applies them on its own context
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use media_source::prelude::*;
//!
//! let store = Arc::new(InMemorySelectionStore::with_sources(sources));
//! let engine = MediaSourceEngine::new(EngineConfig::default(), store, subsystem)?;
//!
//! let _sub = engine.has_queue().observe(|has_queue| {
//!     println!("queue button visible: {}", has_queue);
//! });
//!
//! engine.select(&MediaSourceHandle::browsable("com.example.radio", "com.example.radio/.Browse"))?;
//! engine.dispatch_pending();
//! ```
//!
//! # Architecture
//!
//! ```text
//! collaborator threads              engine context
//! ────────────────────              ──────────────
//! SelectionStore::on_change ─┐
//! ConnectionListener ────────┼──► EventSender ──► EventInbox ──► dispatch_pending()
//! ControllerCallback ────────┘                                       │
//!                                               ┌────────────────────┼──────────────────┐
//!                                               ▼                    ▼                  ▼
//!                                        selected_source    ConnectionMachine   SnapshotAssembler
//!                                               └─────────── node graph ────────────────┘
//! ```

// Modules
pub mod assembler;
pub mod collaborator;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod inbox;
pub mod logging;
pub mod model;
pub mod selection_store;
pub mod selector;

#[cfg(test)]
mod testing;

// Re-exports - Public API
pub use assembler::SnapshotAssembler;
pub use collaborator::{
    CallbackId, ConnectionListener, ControllerCallback, ListenerId, MediaSessionSubsystem,
    SelectionListener, SelectionStore,
};
pub use config::EngineConfig;
pub use connection::{AttemptToken, ConnectionEvent, ConnectionMachine, ConnectionState};
pub use engine::MediaSourceEngine;
pub use error::{EngineError, Result};
pub use inbox::{EngineEvent, EventInbox, EventSender};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use model::{
    CallbackKind, CombinedPlaybackSnapshot, ControllerHandle, ControllerUpdate, EndpointId,
    Generation, MediaController, MediaMetadata, MediaSourceHandle, PackageName, PlaybackState,
    PlaybackStatus, QueueItem, SessionToken,
};
pub use selection_store::InMemorySelectionStore;
pub use selector::ActiveItemSelector;

// Reactive primitives used by the published nodes
pub use node_graph::{Node, ReadNode, Subscription};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::collaborator::{MediaSessionSubsystem, SelectionStore};
    pub use crate::config::EngineConfig;
    pub use crate::connection::ConnectionState;
    pub use crate::engine::MediaSourceEngine;
    pub use crate::error::{EngineError, Result};
    pub use crate::model::{
        CombinedPlaybackSnapshot, ControllerHandle, EndpointId, MediaSourceHandle, PlaybackState,
    };
    pub use crate::selection_store::InMemorySelectionStore;
    pub use node_graph::{Node, ReadNode, Subscription};
}
