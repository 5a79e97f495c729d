//! Dispatch and configuration error types.

/// Errors returned by [`Channel::emit`](crate::Channel::emit) and
/// [`Scene::run`](crate::Scene::run).
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The channel was emitted while it was already emitting, i.e. the
    /// responder graph contains a cycle through it.
    #[error("channel `{channel}` re-entered while emitting")]
    CyclicBroadcast { channel: String },

    /// A system returned an error; the emission stopped there.
    #[error("system `{system}` on channel `{channel}` failed: {source}")]
    System {
        channel: String,
        system: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors from reading [`SceneConfig`](crate::SceneConfig) out of the
/// environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("invalid value `{value}` for {var}")]
    Invalid { var: &'static str, value: String },
}
