//! Combined playback snapshot

use super::{
    ControllerHandle, ControllerUpdate, Generation, MediaMetadata, PackageName, PlaybackStatus,
    QueueItem,
};

/// Immutable aggregate of everything one controller binding reported
///
/// All fields of a snapshot come from callbacks registered against the same
/// `generation`. A new snapshot is built for every accepted update; a
/// published snapshot is never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedPlaybackSnapshot {
    pub generation: Generation,
    pub controller: Option<ControllerHandle>,
    pub metadata: Option<MediaMetadata>,
    pub playback_status: Option<PlaybackStatus>,
    pub queue: Option<Vec<QueueItem>>,
}

impl CombinedPlaybackSnapshot {
    /// Snapshot for a binding without a controller
    pub fn empty(generation: Generation) -> Self {
        Self {
            generation,
            controller: None,
            metadata: None,
            playback_status: None,
            queue: None,
        }
    }

    /// Snapshot seeded from what the controller currently holds
    pub fn read_from(controller: &ControllerHandle, generation: Generation) -> Self {
        Self {
            generation,
            controller: Some(controller.clone()),
            metadata: controller.metadata(),
            playback_status: controller.playback_status(),
            queue: controller.queue(),
        }
    }

    /// Copy of this snapshot with the field matching `update` replaced
    pub fn with_update(&self, update: ControllerUpdate) -> Self {
        let mut next = self.clone();
        match update {
            ControllerUpdate::Metadata(metadata) => next.metadata = metadata,
            ControllerUpdate::PlaybackState(status) => next.playback_status = status,
            ControllerUpdate::Queue(queue) => next.queue = queue,
        }
        next
    }

    /// True iff the queue is present and non-empty
    pub fn has_queue(&self) -> bool {
        self.queue.as_ref().is_some_and(|queue| !queue.is_empty())
    }

    pub fn is_playing(&self) -> bool {
        self.playback_status
            .as_ref()
            .is_some_and(PlaybackStatus::is_playing)
    }

    pub fn package_name(&self) -> Option<&PackageName> {
        self.controller.as_ref().map(ControllerHandle::package_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlaybackState;

    #[test]
    fn test_with_update_leaves_original_untouched() {
        let original = CombinedPlaybackSnapshot::empty(Generation::INITIAL.next());
        let updated = original.with_update(ControllerUpdate::Metadata(Some(
            MediaMetadata::with_title("News"),
        )));

        assert!(original.metadata.is_none());
        assert_eq!(updated.metadata, Some(MediaMetadata::with_title("News")));
        assert_eq!(updated.generation, original.generation);
    }

    #[test]
    fn test_has_queue() {
        let empty = CombinedPlaybackSnapshot::empty(Generation::INITIAL);
        assert!(!empty.has_queue());

        let blank = empty.with_update(ControllerUpdate::Queue(Some(vec![])));
        assert!(!blank.has_queue());

        let filled = blank.with_update(ControllerUpdate::Queue(Some(vec![QueueItem::new(1, "a")])));
        assert!(filled.has_queue());

        let cleared = filled.with_update(ControllerUpdate::Queue(None));
        assert!(!cleared.has_queue());
    }

    #[test]
    fn test_is_playing() {
        let snapshot = CombinedPlaybackSnapshot::empty(Generation::INITIAL).with_update(
            ControllerUpdate::PlaybackState(Some(PlaybackStatus::new(PlaybackState::Playing))),
        );
        assert!(snapshot.is_playing());
    }
}
