//! Data model for media source state

mod controller;
mod id_types;
mod media_source;
mod playback;
mod snapshot;

pub use controller::{
    CallbackKind, ControllerHandle, ControllerUpdate, Generation, MediaController,
};
pub use id_types::{EndpointId, PackageName, SessionToken};
pub use media_source::MediaSourceHandle;
pub use playback::{MediaMetadata, PlaybackState, PlaybackStatus, QueueItem};
pub use snapshot::CombinedPlaybackSnapshot;
