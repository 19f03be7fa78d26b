//! Delivery attempt records and the in-memory attempt store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use relay_events::EventEnvelope;
use relay_id::{EventId, SubscriberId};
use serde::Serialize;

use crate::AdminError;

/// Lifecycle state of a delivery attempt record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Created or about to be sent.
    Pending,
    /// Endpoint acknowledged the delivery. Terminal.
    Succeeded,
    /// The last send failed transiently; a retry is scheduled.
    Failed,
    /// Retry budget exhausted or failure was permanent. Terminal until
    /// manually requeued.
    DeadLettered,
}

impl DeliveryStatus {
    /// Returns true for states that schedule no further sends.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Succeeded | DeliveryStatus::DeadLettered)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Succeeded => "succeeded",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::DeadLettered => "dead_lettered",
        };
        write!(f, "{}", s)
    }
}

/// One delivery record per `(event, subscriber)` pair.
///
/// Records are never deleted, only transitioned; the store doubles as the
/// audit trail. `attempt_number` counts sends performed so far.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryAttempt {
    pub event_id: EventId,
    pub subscriber_id: SubscriberId,
    pub attempt_number: u32,
    pub status: DeliveryStatus,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    events: HashMap<EventId, EventEnvelope>,
    attempts: HashMap<(EventId, SubscriberId), DeliveryAttempt>,
}

/// In-memory store of dispatched events and their delivery attempts.
///
/// All mutation goes through the dispatcher and scheduler; the admin surface
/// only reads, with the single exception of [`AttemptStore::requeue`].
#[derive(Debug, Default)]
pub struct AttemptStore {
    inner: Mutex<Inner>,
}

impl AttemptStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event as dispatched.
    ///
    /// Returns false if the event was already dispatched; the caller must
    /// not create attempts or send anything in that case.
    pub fn insert_event(&self, event: &EventEnvelope) -> bool {
        let mut inner = self.lock();
        if inner.events.contains_key(&event.event_id) {
            return false;
        }
        inner.events.insert(event.event_id, event.clone());
        true
    }

    /// Returns the stored envelope for an event, if dispatched.
    pub fn event(&self, event_id: &EventId) -> Option<EventEnvelope> {
        self.lock().events.get(event_id).cloned()
    }

    /// Creates the `Pending` attempt record for a pair.
    pub fn create_attempt(
        &self,
        event_id: EventId,
        subscriber_id: SubscriberId,
    ) -> DeliveryAttempt {
        let attempt = DeliveryAttempt {
            event_id,
            subscriber_id,
            attempt_number: 0,
            status: DeliveryStatus::Pending,
            next_retry_at: None,
            last_error: None,
            updated_at: Utc::now(),
        };

        self.lock()
            .attempts
            .insert((event_id, subscriber_id), attempt.clone());
        attempt
    }

    /// Marks the start of a send: transitions to `Pending` and increments
    /// the attempt counter. Returns the new attempt number.
    pub fn begin_attempt(&self, event_id: &EventId, subscriber_id: &SubscriberId) -> u32 {
        let mut inner = self.lock();
        let attempt = inner
            .attempts
            .entry((*event_id, *subscriber_id))
            .or_insert_with(|| DeliveryAttempt {
                event_id: *event_id,
                subscriber_id: *subscriber_id,
                attempt_number: 0,
                status: DeliveryStatus::Pending,
                next_retry_at: None,
                last_error: None,
                updated_at: Utc::now(),
            });

        attempt.attempt_number += 1;
        attempt.status = DeliveryStatus::Pending;
        attempt.next_retry_at = None;
        attempt.updated_at = Utc::now();
        attempt.attempt_number
    }

    /// Transitions a pair to `Succeeded`. Terminal.
    pub fn record_success(&self, event_id: &EventId, subscriber_id: &SubscriberId) {
        self.transition(event_id, subscriber_id, |attempt| {
            attempt.status = DeliveryStatus::Succeeded;
            attempt.next_retry_at = None;
            attempt.last_error = None;
        });
    }

    /// Transitions a pair to `Failed` with the retry time recorded.
    pub fn record_failure(
        &self,
        event_id: &EventId,
        subscriber_id: &SubscriberId,
        next_retry_at: DateTime<Utc>,
        reason: &str,
    ) {
        self.transition(event_id, subscriber_id, |attempt| {
            attempt.status = DeliveryStatus::Failed;
            attempt.next_retry_at = Some(next_retry_at);
            attempt.last_error = Some(reason.to_string());
        });
    }

    /// Transitions a pair to `DeadLettered` with the reason recorded.
    pub fn record_dead_letter(
        &self,
        event_id: &EventId,
        subscriber_id: &SubscriberId,
        reason: &str,
    ) {
        self.transition(event_id, subscriber_id, |attempt| {
            attempt.status = DeliveryStatus::DeadLettered;
            attempt.next_retry_at = None;
            attempt.last_error = Some(reason.to_string());
        });
    }

    /// Returns the attempt record for a pair.
    pub fn get(&self, event_id: &EventId, subscriber_id: &SubscriberId) -> Option<DeliveryAttempt> {
        self.lock()
            .attempts
            .get(&(*event_id, *subscriber_id))
            .cloned()
    }

    /// Returns all attempt records for an event.
    pub fn attempts_for_event(&self, event_id: &EventId) -> Vec<DeliveryAttempt> {
        self.lock()
            .attempts
            .values()
            .filter(|a| a.event_id == *event_id)
            .cloned()
            .collect()
    }

    /// Returns all dead-lettered attempts, for operator inspection.
    pub fn dead_letters(&self) -> Vec<DeliveryAttempt> {
        self.lock()
            .attempts
            .values()
            .filter(|a| a.status == DeliveryStatus::DeadLettered)
            .cloned()
            .collect()
    }

    /// Resets a dead-lettered attempt so it can re-enter delivery.
    ///
    /// Only valid while the pair is `DeadLettered`; the guard also prevents
    /// two concurrent requeues from both spawning a delivery task. Returns
    /// the stored envelope for redelivery.
    pub fn requeue(
        &self,
        event_id: &EventId,
        subscriber_id: &SubscriberId,
    ) -> Result<EventEnvelope, AdminError> {
        let mut inner = self.lock();

        let attempt =
            inner
                .attempts
                .get_mut(&(*event_id, *subscriber_id))
                .ok_or(AdminError::AttemptNotFound {
                    event_id: *event_id,
                    subscriber_id: *subscriber_id,
                })?;

        if attempt.status != DeliveryStatus::DeadLettered {
            return Err(AdminError::NotDeadLettered {
                event_id: *event_id,
                subscriber_id: *subscriber_id,
            });
        }

        attempt.status = DeliveryStatus::Pending;
        attempt.attempt_number = 0;
        attempt.next_retry_at = None;
        attempt.last_error = None;
        attempt.updated_at = Utc::now();

        inner
            .events
            .get(event_id)
            .cloned()
            .ok_or(AdminError::AttemptNotFound {
                event_id: *event_id,
                subscriber_id: *subscriber_id,
            })
    }

    fn transition<F>(&self, event_id: &EventId, subscriber_id: &SubscriberId, apply: F)
    where
        F: FnOnce(&mut DeliveryAttempt),
    {
        let mut inner = self.lock();
        if let Some(attempt) = inner.attempts.get_mut(&(*event_id, *subscriber_id)) {
            apply(attempt);
            attempt.updated_at = Utc::now();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use relay_events::{EnvelopeFactory, OperationKind};

    use super::*;

    fn envelope() -> EventEnvelope {
        let factory = EnvelopeFactory::new();
        let kind = OperationKind::new("order.created").unwrap();
        factory.build(&kind, &serde_json::json!({"order_id": 42})).unwrap()
    }

    #[test]
    fn test_insert_event_is_idempotent() {
        let store = AttemptStore::new();
        let event = envelope();

        assert!(store.insert_event(&event));
        assert!(!store.insert_event(&event));
        assert!(store.event(&event.event_id).is_some());
    }

    #[test]
    fn test_attempt_lifecycle_to_success() {
        let store = AttemptStore::new();
        let event = envelope();
        let subscriber_id = SubscriberId::new();

        store.insert_event(&event);
        let attempt = store.create_attempt(event.event_id, subscriber_id);
        assert_eq!(attempt.status, DeliveryStatus::Pending);
        assert_eq!(attempt.attempt_number, 0);

        assert_eq!(store.begin_attempt(&event.event_id, &subscriber_id), 1);
        store.record_success(&event.event_id, &subscriber_id);

        let attempt = store.get(&event.event_id, &subscriber_id).unwrap();
        assert_eq!(attempt.status, DeliveryStatus::Succeeded);
        assert_eq!(attempt.attempt_number, 1);
        assert!(attempt.status.is_terminal());
    }

    #[test]
    fn test_failure_records_retry_time_and_reason() {
        let store = AttemptStore::new();
        let event = envelope();
        let subscriber_id = SubscriberId::new();

        store.insert_event(&event);
        store.create_attempt(event.event_id, subscriber_id);
        store.begin_attempt(&event.event_id, &subscriber_id);

        let retry_at = Utc::now() + chrono::Duration::seconds(1);
        store.record_failure(&event.event_id, &subscriber_id, retry_at, "endpoint returned 503");

        let attempt = store.get(&event.event_id, &subscriber_id).unwrap();
        assert_eq!(attempt.status, DeliveryStatus::Failed);
        assert_eq!(attempt.next_retry_at, Some(retry_at));
        assert_eq!(attempt.last_error.as_deref(), Some("endpoint returned 503"));
    }

    #[test]
    fn test_dead_letters_are_listed() {
        let store = AttemptStore::new();
        let event = envelope();
        let subscriber_id = SubscriberId::new();

        store.insert_event(&event);
        store.create_attempt(event.event_id, subscriber_id);
        store.begin_attempt(&event.event_id, &subscriber_id);
        store.record_dead_letter(&event.event_id, &subscriber_id, "retry budget exhausted");

        let dead = store.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].event_id, event.event_id);
    }

    #[test]
    fn test_requeue_requires_dead_letter() {
        let store = AttemptStore::new();
        let event = envelope();
        let subscriber_id = SubscriberId::new();

        store.insert_event(&event);
        store.create_attempt(event.event_id, subscriber_id);

        assert!(matches!(
            store.requeue(&event.event_id, &subscriber_id).unwrap_err(),
            AdminError::NotDeadLettered { .. }
        ));

        store.begin_attempt(&event.event_id, &subscriber_id);
        store.record_dead_letter(&event.event_id, &subscriber_id, "endpoint returned 400");

        let requeued = store.requeue(&event.event_id, &subscriber_id).unwrap();
        assert_eq!(requeued.event_id, event.event_id);

        let attempt = store.get(&event.event_id, &subscriber_id).unwrap();
        assert_eq!(attempt.status, DeliveryStatus::Pending);
        assert_eq!(attempt.attempt_number, 0);

        // Requeue cannot race itself: the second call sees Pending.
        assert!(store.requeue(&event.event_id, &subscriber_id).is_err());
    }

    #[test]
    fn test_requeue_unknown_pair() {
        let store = AttemptStore::new();
        assert!(matches!(
            store
                .requeue(&EventId::new(), &SubscriberId::new())
                .unwrap_err(),
            AdminError::AttemptNotFound { .. }
        ));
    }
}
