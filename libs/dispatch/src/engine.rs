//! Engine wiring: queue, worker, and the administrative surface.

use std::sync::Arc;

use relay_events::{EnvelopeFactory, EventEnvelope, KindRegistry};
use relay_id::{EventId, SubscriberId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{
    AdminError, AttemptStore, DeliveryAttempt, DeliveryConfig, Dispatcher, EndpointTransport,
    HttpTransport, Relay, RetryPolicy, Subscriber, SubscriberSet,
};

/// Owns the dispatch worker and exposes emission plus the administrative
/// surface.
///
/// Must be started from within a tokio runtime. Dropping the engine without
/// calling [`DispatchEngine::shutdown`] lets in-flight deliveries finish on
/// their own; shutdown stops the worker and abandons pending retries.
pub struct DispatchEngine {
    relay: Relay,
    subscribers: Arc<SubscriberSet>,
    store: Arc<AttemptStore>,
    dispatcher: Arc<Dispatcher>,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl DispatchEngine {
    /// Starts an engine delivering over HTTP.
    ///
    /// The registry is consumed: all `register` calls happen before start,
    /// which is what makes lookups lock-free afterward.
    pub fn start(config: DeliveryConfig, registry: KindRegistry) -> Self {
        let transport = Arc::new(HttpTransport::new(config.delivery_timeout));
        Self::with_transport(config, registry, transport)
    }

    /// Starts an engine with a custom transport (used by tests).
    pub fn with_transport(
        config: DeliveryConfig,
        registry: KindRegistry,
        transport: Arc<dyn EndpointTransport>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::channel(config.queue_capacity);

        let subscribers = Arc::new(SubscriberSet::new());
        let store = Arc::new(AttemptStore::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&subscribers),
            Arc::clone(&store),
            transport,
            RetryPolicy::from(&config),
            shutdown_rx,
        );

        let worker = tokio::spawn(Arc::clone(&dispatcher).run(rx));

        let relay = Relay::new(Arc::new(registry), Arc::new(EnvelopeFactory::new()), tx);

        Self {
            relay,
            subscribers,
            store,
            dispatcher,
            shutdown_tx,
            worker,
        }
    }

    /// Returns the emission handle. Clone it freely into the code that
    /// completes business operations.
    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Dispatches an event directly, bypassing the emission queue.
    ///
    /// Idempotent on `event_id`; see [`Dispatcher::dispatch`]. Intended for
    /// callers that manage their own queueing.
    pub async fn dispatch(&self, event: EventEnvelope) -> Vec<DeliveryAttempt> {
        self.dispatcher.dispatch(event).await
    }

    /// Registers a new active subscriber.
    pub fn add_subscriber(&self, endpoint: &str) -> Result<Subscriber, AdminError> {
        self.subscribers.add(endpoint)
    }

    /// Removes a subscriber. Pending retries for it will not fire.
    pub fn remove_subscriber(&self, id: &SubscriberId) -> Result<(), AdminError> {
        self.subscribers.remove(id)
    }

    /// Deactivates a subscriber without removing it. Pending retries for it
    /// will not fire.
    pub fn deactivate_subscriber(&self, id: &SubscriberId) -> Result<(), AdminError> {
        self.subscribers.deactivate(id)
    }

    /// Looks up a subscriber.
    pub fn subscriber(&self, id: &SubscriberId) -> Option<Subscriber> {
        self.subscribers.get(id)
    }

    /// Returns the delivery attempt record for a pair.
    pub fn attempt(
        &self,
        event_id: &EventId,
        subscriber_id: &SubscriberId,
    ) -> Option<DeliveryAttempt> {
        self.store.get(event_id, subscriber_id)
    }

    /// Returns all delivery attempt records for an event.
    pub fn attempts_for_event(&self, event_id: &EventId) -> Vec<DeliveryAttempt> {
        self.store.attempts_for_event(event_id)
    }

    /// Lists all dead-lettered attempts for operator inspection.
    pub fn dead_letters(&self) -> Vec<DeliveryAttempt> {
        self.store.dead_letters()
    }

    /// Manually requeues a dead-lettered attempt.
    pub fn requeue(
        &self,
        event_id: EventId,
        subscriber_id: SubscriberId,
    ) -> Result<(), AdminError> {
        self.dispatcher.requeue(event_id, subscriber_id)
    }

    /// Signals shutdown and waits for the worker to stop.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.worker.await;
    }
}
