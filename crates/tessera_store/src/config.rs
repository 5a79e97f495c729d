//! Store configuration.

use serde::{Deserialize, Serialize};

/// What `spawn` does when handed an identifier that is already live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespawnPolicy {
    /// Refuse with [`StoreError::EntityAlreadyExists`](crate::StoreError::EntityAlreadyExists).
    #[default]
    Fail,
    /// Return the live entity unchanged; its components are kept.
    Reuse,
}

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Behaviour of `spawn` for an already-live identifier.
    #[serde(default)]
    pub respawn: RespawnPolicy,
}

impl StoreConfig {
    /// Create the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the respawn policy.
    #[must_use]
    pub fn with_respawn(mut self, respawn: RespawnPolicy) -> Self {
        self.respawn = respawn;
        self
    }
}
