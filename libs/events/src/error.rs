//! Error types for event construction and registry configuration.

use thiserror::Error;

/// Errors that can occur when registering kinds or building events.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// A kind was re-registered with a different replication flag.
    ///
    /// This is a configuration error: the registry is built once at startup
    /// and two call sites disagreeing about a kind is a programming mistake.
    #[error("conflicting registration for kind '{kind}': already registered with replicated={existing}")]
    ConflictingRegistration { kind: String, existing: bool },

    /// The operation kind string is not a valid kind.
    #[error("invalid operation kind: {0}")]
    InvalidKind(String),

    /// The event payload could not be serialized to the wire format.
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::InvalidPayload(err.to_string())
    }
}
