//! Event envelope - the immutable wrapper around a completed operation.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use relay_id::EventId;
use serde::{Deserialize, Serialize};

use crate::{EventError, OperationKind};

/// The event envelope - identity, ordering, and timestamp metadata around a
/// domain payload.
///
/// Envelopes are immutable once built. The struct is also the webhook wire
/// format: deliveries POST it as a JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Globally unique event identifier.
    pub event_id: EventId,

    /// The operation kind that produced this event.
    pub kind: OperationKind,

    /// Event-specific payload.
    pub payload: serde_json::Value,

    /// When the event was emitted.
    pub created_at: DateTime<Utc>,

    /// Monotonic sequence within the kind. Strictly increasing, never
    /// reused; gapless under single-threaded emission.
    pub sequence: u64,
}

/// Builds event envelopes, owning the per-kind sequence counters.
///
/// Construction is pure apart from the counter increment: the factory
/// assigns identity, sequence, and timestamp but performs no I/O.
#[derive(Debug, Default)]
pub struct EnvelopeFactory {
    counters: Mutex<HashMap<OperationKind, u64>>,
}

impl EnvelopeFactory {
    /// Creates a factory with all sequence counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an envelope for a completed operation.
    ///
    /// Fails with `EventError::InvalidPayload` if the payload cannot be
    /// serialized to JSON. Sequence numbers start at 1 per kind.
    pub fn build<P>(&self, kind: &OperationKind, payload: &P) -> Result<EventEnvelope, EventError>
    where
        P: Serialize + ?Sized,
    {
        let payload = serde_json::to_value(payload)?;
        let sequence = self.next_sequence(kind);

        Ok(EventEnvelope {
            event_id: EventId::new(),
            kind: kind.clone(),
            payload,
            created_at: Utc::now(),
            sequence,
        })
    }

    fn next_sequence(&self, kind: &OperationKind) -> u64 {
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let counter = counters.entry(kind.clone()).or_insert(0);
        *counter += 1;
        *counter
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn kind(s: &str) -> OperationKind {
        OperationKind::new(s).unwrap()
    }

    #[test]
    fn test_build_assigns_identity_and_sequence() {
        let factory = EnvelopeFactory::new();
        let envelope = factory
            .build(&kind("order.created"), &serde_json::json!({"order_id": 42}))
            .unwrap();

        assert_eq!(envelope.kind.as_str(), "order.created");
        assert_eq!(envelope.sequence, 1);
        assert_eq!(envelope.payload["order_id"], 42);
    }

    #[test]
    fn test_sequences_are_gapless_per_kind() {
        let factory = EnvelopeFactory::new();
        let orders = kind("order.created");
        let members = kind("member.removed");

        for expected in 1..=5u64 {
            let envelope = factory.build(&orders, &serde_json::json!({})).unwrap();
            assert_eq!(envelope.sequence, expected);
        }

        // A different kind has its own counter.
        let envelope = factory.build(&members, &serde_json::json!({})).unwrap();
        assert_eq!(envelope.sequence, 1);
    }

    #[test]
    fn test_concurrent_sequences_are_unique() {
        let factory = Arc::new(EnvelopeFactory::new());
        let orders = kind("order.created");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                let orders = orders.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|_| factory.build(&orders, &serde_json::json!({})).unwrap().sequence)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut sequences = Vec::new();
        for handle in handles {
            sequences.extend(handle.join().unwrap());
        }

        let unique: std::collections::HashSet<_> = sequences.iter().collect();
        assert_eq!(sequences.len(), unique.len());
        assert_eq!(sequences.len(), 8 * 50);
    }

    #[test]
    fn test_unserializable_payload_is_rejected() {
        // Maps with non-string keys cannot be represented in JSON.
        let payload: HashMap<(u8, u8), &str> = HashMap::from([((1, 2), "x")]);
        let factory = EnvelopeFactory::new();
        let err = factory.build(&kind("order.created"), &payload).unwrap_err();
        assert!(matches!(err, EventError::InvalidPayload(_)));
    }

    #[test]
    fn test_envelope_json_roundtrip() {
        let factory = EnvelopeFactory::new();
        let envelope = factory
            .build(&kind("order.created"), &serde_json::json!({"order_id": 42}))
            .unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: EventEnvelope = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.event_id, envelope.event_id);
        assert_eq!(parsed.sequence, envelope.sequence);
        assert_eq!(parsed.payload, envelope.payload);
    }
}
