//! Configuration for the media source engine

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Configuration for `MediaSourceEngine`
///
/// Every field has a default, so a JSON document only needs to name the
/// fields it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of marshaled events handled by one `dispatch_pending` call
    /// Default: 256
    pub dispatch_batch_limit: usize,

    /// Read the selection store and start connecting while the engine is built
    /// Default: true
    pub connect_on_start: bool,

    /// Re-requesting the endpoint of a failed attempt starts a new attempt
    /// Default: true
    pub retry_failed_on_reselect: bool,

    /// Issue a disconnect for a suspended endpoint when another one is requested
    /// Default: true
    pub disconnect_suspended_on_switch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dispatch_batch_limit: 256,
            connect_on_start: true,
            retry_failed_on_reselect: true,
            disconnect_suspended_on_switch: true,
        }
    }
}

impl EngineConfig {
    /// Create an EngineConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for hosts that build the engine before the media
    /// subsystem is ready; nothing connects until the selection changes.
    pub fn deferred() -> Self {
        Self {
            connect_on_start: false,
            ..Default::default()
        }
    }

    /// Configuration that drains the event queue one event at a time
    pub fn step_by_step() -> Self {
        Self {
            dispatch_batch_limit: 1,
            ..Default::default()
        }
    }

    /// Parse a JSON document and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.dispatch_batch_limit == 0 {
            return Err(EngineError::Config(
                "dispatch_batch_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
