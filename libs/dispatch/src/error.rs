//! Error types for delivery and the administrative surface.

use relay_id::{EventId, SubscriberId};
use thiserror::Error;

/// Errors that can occur when delivering an event to an endpoint.
///
/// The transient/permanent split drives the retry scheduler: transient
/// failures consume retry budget, permanent failures dead-letter immediately.
#[derive(Debug, Error, Clone)]
pub enum DeliveryError {
    /// The endpoint may succeed on a later attempt (timeout, connection
    /// error, 408/429/5xx response).
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// Retrying cannot help (malformed endpoint, other 4xx response).
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    /// Returns true if the failure should be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

/// Errors surfaced by the administrative surface.
#[derive(Debug, Error, Clone)]
pub enum AdminError {
    /// The subscriber endpoint is not a usable HTTP(S) URL.
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// No subscriber exists with this ID.
    #[error("subscriber not found: {0}")]
    SubscriberNotFound(SubscriberId),

    /// No delivery attempt exists for this pair.
    #[error("no delivery attempt for event {event_id} and subscriber {subscriber_id}")]
    AttemptNotFound {
        event_id: EventId,
        subscriber_id: SubscriberId,
    },

    /// Requeue is only valid for dead-lettered attempts.
    #[error("attempt for event {event_id} and subscriber {subscriber_id} is not dead-lettered")]
    NotDeadLettered {
        event_id: EventId,
        subscriber_id: SubscriberId,
    },
}
