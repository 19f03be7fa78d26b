//! Background dispatch worker and per-pair delivery tasks.
//!
//! The worker drains the emission queue and fans each event out to the
//! active subscribers. Each `(event, subscriber)` pair is handed to exactly
//! one spawned delivery task, which owns the pair's attempt record for its
//! whole lifetime: send, classify, back off, retry, dead-letter. Single
//! ownership is what keeps at most one send in flight per pair.

use std::sync::Arc;

use chrono::Utc;
use relay_events::EventEnvelope;
use relay_id::{EventId, SubscriberId};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    AdminError, AttemptStore, DeliveryAttempt, DeliveryError, EndpointTransport, RetryPolicy,
    SubscriberSet,
};

/// Fans events out to subscribers and drives retries to a terminal state.
pub struct Dispatcher {
    subscribers: Arc<SubscriberSet>,
    store: Arc<AttemptStore>,
    transport: Arc<dyn EndpointTransport>,
    policy: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl Dispatcher {
    /// Creates a dispatcher. Delivery tasks observe the same shutdown
    /// channel as the worker loop.
    pub fn new(
        subscribers: Arc<SubscriberSet>,
        store: Arc<AttemptStore>,
        transport: Arc<dyn EndpointTransport>,
        policy: RetryPolicy,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        Arc::new(Self {
            subscribers,
            store,
            transport,
            policy,
            shutdown,
        })
    }

    /// Runs the worker until the emission queue closes or shutdown is
    /// signalled.
    #[instrument(skip_all, name = "dispatch_worker")]
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<EventEnvelope>) {
        info!("Starting dispatch worker");
        let mut shutdown = self.shutdown.clone();
        let mut events_dispatched: u64 = 0;

        loop {
            tokio::select! {
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            self.dispatch(event).await;
                            events_dispatched += 1;
                        }
                        None => {
                            info!(events_dispatched, "Emission queue closed, stopping dispatch worker");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(events_dispatched, "Shutdown signal received, stopping dispatch worker");
                        break;
                    }
                }
            }
        }
    }

    /// Fans one event out to all active subscribers.
    ///
    /// Idempotent on `event_id`: the first call creates one `Pending`
    /// attempt per active subscriber and spawns their delivery tasks; any
    /// repeat call returns the existing attempts and sends nothing.
    pub async fn dispatch(self: &Arc<Self>, event: EventEnvelope) -> Vec<DeliveryAttempt> {
        if !self.store.insert_event(&event) {
            debug!(event_id = %event.event_id, "Event already dispatched, skipping");
            return self.store.attempts_for_event(&event.event_id);
        }

        let subscribers = self.subscribers.active();
        if subscribers.is_empty() {
            debug!(event_id = %event.event_id, kind = %event.kind, "No active subscribers");
            return Vec::new();
        }

        debug!(
            event_id = %event.event_id,
            kind = %event.kind,
            subscriber_count = subscribers.len(),
            "Dispatching event"
        );

        let mut attempts = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let attempt = self.store.create_attempt(event.event_id, subscriber.id);
            attempts.push(attempt);

            let dispatcher = Arc::clone(self);
            let event = event.clone();
            tokio::spawn(async move {
                dispatcher.deliver_with_retries(event, subscriber.id).await;
            });
        }

        attempts
    }

    /// Puts a dead-lettered pair back on the delivery path.
    ///
    /// The store transition to `Pending` happens before the task is spawned,
    /// so a concurrent duplicate requeue fails with `NotDeadLettered` and
    /// never produces a second in-flight send.
    pub fn requeue(
        self: &Arc<Self>,
        event_id: EventId,
        subscriber_id: SubscriberId,
    ) -> Result<(), AdminError> {
        let event = self.store.requeue(&event_id, &subscriber_id)?;
        info!(event_id = %event_id, subscriber_id = %subscriber_id, "Requeueing dead-lettered delivery");

        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.deliver_with_retries(event, subscriber_id).await;
        });
        Ok(())
    }

    /// Owns one `(event, subscriber)` pair until it reaches a terminal
    /// state.
    async fn deliver_with_retries(
        self: Arc<Self>,
        event: EventEnvelope,
        subscriber_id: SubscriberId,
    ) {
        let mut shutdown = self.shutdown.clone();

        loop {
            // Deactivation or removal cancels any scheduled retry before it
            // can fire.
            let Some(subscriber) = self.subscribers.active_subscriber(&subscriber_id) else {
                let reason = "subscriber removed or deactivated";
                self.store
                    .record_dead_letter(&event.event_id, &subscriber_id, reason);
                error!(
                    event_id = %event.event_id,
                    subscriber_id = %subscriber_id,
                    reason,
                    "Delivery dead-lettered"
                );
                return;
            };

            let attempt = self.store.begin_attempt(&event.event_id, &subscriber_id);

            match self.transport.deliver(&subscriber, &event).await {
                Ok(()) => {
                    self.store.record_success(&event.event_id, &subscriber_id);
                    info!(
                        event_id = %event.event_id,
                        subscriber_id = %subscriber_id,
                        attempt,
                        "Delivery succeeded"
                    );
                    return;
                }
                Err(DeliveryError::Permanent(reason)) => {
                    self.store
                        .record_dead_letter(&event.event_id, &subscriber_id, &reason);
                    error!(
                        event_id = %event.event_id,
                        subscriber_id = %subscriber_id,
                        attempt,
                        reason = %reason,
                        "Delivery dead-lettered: permanent failure"
                    );
                    return;
                }
                Err(DeliveryError::Transient(reason)) => {
                    if attempt >= self.policy.max_attempts {
                        let reason = format!(
                            "retry budget exhausted after {} attempts: {}",
                            attempt, reason
                        );
                        self.store
                            .record_dead_letter(&event.event_id, &subscriber_id, &reason);
                        error!(
                            event_id = %event.event_id,
                            subscriber_id = %subscriber_id,
                            attempt,
                            reason = %reason,
                            "Delivery dead-lettered"
                        );
                        return;
                    }

                    let backoff = self.policy.backoff_for(attempt);
                    let next_retry_at = Utc::now()
                        + chrono::Duration::milliseconds(
                            backoff.as_millis().min(i64::MAX as u128) as i64
                        );
                    self.store.record_failure(
                        &event.event_id,
                        &subscriber_id,
                        next_retry_at,
                        &reason,
                    );
                    warn!(
                        event_id = %event.event_id,
                        subscriber_id = %subscriber_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        reason = %reason,
                        "Delivery failed, retry scheduled"
                    );

                    tokio::select! {
                        _ = sleep(backoff) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                debug!(
                                    event_id = %event.event_id,
                                    subscriber_id = %subscriber_id,
                                    "Shutdown during backoff, abandoning retry"
                                );
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}
