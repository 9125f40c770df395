//! Controller capability and callback vocabulary

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{MediaMetadata, PackageName, PlaybackStatus, QueueItem, SessionToken};

/// Capability to query one playback session
///
/// Implemented by the media subsystem. The getters return what the session
/// currently holds and are used to seed a snapshot at bind time.
pub trait MediaController: Send + Sync + 'static {
    fn session_token(&self) -> &SessionToken;
    fn package_name(&self) -> &PackageName;
    fn metadata(&self) -> Option<MediaMetadata>;
    fn playback_status(&self) -> Option<PlaybackStatus>;
    fn queue(&self) -> Option<Vec<QueueItem>>;
}

/// Shared, opaque handle to a controller
///
/// Two handles are equal when they control the same session.
#[derive(Clone)]
pub struct ControllerHandle(Arc<dyn MediaController>);

impl ControllerHandle {
    pub fn new(controller: impl MediaController) -> Self {
        Self(Arc::new(controller))
    }

    pub fn from_arc(controller: Arc<dyn MediaController>) -> Self {
        Self(controller)
    }

    pub fn session_token(&self) -> &SessionToken {
        self.0.session_token()
    }

    pub fn package_name(&self) -> &PackageName {
        self.0.package_name()
    }

    pub fn metadata(&self) -> Option<MediaMetadata> {
        self.0.metadata()
    }

    pub fn playback_status(&self) -> Option<PlaybackStatus> {
        self.0.playback_status()
    }

    pub fn queue(&self) -> Option<Vec<QueueItem>> {
        self.0.queue()
    }
}

impl PartialEq for ControllerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.session_token() == other.session_token()
    }
}

impl Eq for ControllerHandle {}

impl Hash for ControllerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.session_token().hash(state);
    }
}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("session", &self.session_token().as_str())
            .field("package", &self.package_name().as_str())
            .finish()
    }
}

/// Monotonic counter distinguishing successive controller bindings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    pub const INITIAL: Generation = Generation(0);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Kinds of change notification a controller can deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackKind {
    Metadata,
    PlaybackState,
    Queue,
}

impl CallbackKind {
    pub const ALL: [CallbackKind; 3] = [
        CallbackKind::Metadata,
        CallbackKind::PlaybackState,
        CallbackKind::Queue,
    ];
}

/// A value delivered by a controller callback
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerUpdate {
    Metadata(Option<MediaMetadata>),
    PlaybackState(Option<PlaybackStatus>),
    Queue(Option<Vec<QueueItem>>),
}

impl ControllerUpdate {
    pub fn kind(&self) -> CallbackKind {
        match self {
            ControllerUpdate::Metadata(_) => CallbackKind::Metadata,
            ControllerUpdate::PlaybackState(_) => CallbackKind::PlaybackState,
            ControllerUpdate::Queue(_) => CallbackKind::Queue,
        }
    }
}
