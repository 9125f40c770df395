//! Playback data delivered by a controller

use serde::{Deserialize, Serialize};

/// Metadata of the item currently loaded in a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Identifier of the item within its source
    pub media_id: Option<String>,
    pub title: Option<String>,
    /// Artist or show name
    pub subtitle: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
    pub art_uri: Option<String>,
}

impl MediaMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Check if the metadata has any meaningful content
    pub fn is_empty(&self) -> bool {
        self.media_id.is_none() && self.title.is_none() && self.subtitle.is_none() && self.album.is_none()
    }
}

/// Transport state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No state reported yet
    #[default]
    None,
    Stopped,
    Paused,
    Playing,
    Buffering,
    Connecting,
    Error,
}

impl PlaybackState {
    /// Parse a transport state name such as "PLAYING" or "paused"
    pub fn from_name(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "PLAYING" => PlaybackState::Playing,
            "PAUSED" | "PAUSED_PLAYBACK" => PlaybackState::Paused,
            "STOPPED" => PlaybackState::Stopped,
            "BUFFERING" | "TRANSITIONING" => PlaybackState::Buffering,
            "CONNECTING" => PlaybackState::Connecting,
            "ERROR" => PlaybackState::Error,
            _ => PlaybackState::None,
        }
    }

    /// Whether the session is actively producing or about to produce audio
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Playing | PlaybackState::Buffering | PlaybackState::Connecting
        )
    }
}

/// Playback status reported by a controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position_ms: u64,
    /// 1.0 is normal speed, 0.0 while paused
    pub speed: f32,
    pub error_message: Option<String>,
}

impl PlaybackStatus {
    pub fn new(state: PlaybackState) -> Self {
        let speed = if state == PlaybackState::Playing { 1.0 } else { 0.0 };
        Self {
            state,
            speed,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position_ms: u64) -> Self {
        self.position_ms = position_ms;
        self
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: PlaybackState::Error,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

/// One entry of a session's play queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub queue_id: i64,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub media_id: Option<String>,
}

impl QueueItem {
    pub fn new(queue_id: i64, title: impl Into<String>) -> Self {
        Self {
            queue_id,
            title: Some(title.into()),
            subtitle: None,
            media_id: None,
        }
    }
}
