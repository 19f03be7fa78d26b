//! Emission facade handed to the code that completes business operations.

use std::sync::Arc;

use relay_events::{EnvelopeFactory, EventEnvelope, EventError, KindRegistry, OperationKind};
use relay_id::EventId;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error};

/// Cheap-to-clone handle for emitting replicated events.
///
/// Emission is decoupled from delivery by the bounded queue: `emit` never
/// blocks and delivery failures never propagate back to the caller. The only
/// error a caller can see is a payload that does not serialize.
#[derive(Clone)]
pub struct Relay {
    registry: Arc<KindRegistry>,
    factory: Arc<EnvelopeFactory>,
    tx: mpsc::Sender<EventEnvelope>,
}

impl Relay {
    pub(crate) fn new(
        registry: Arc<KindRegistry>,
        factory: Arc<EnvelopeFactory>,
        tx: mpsc::Sender<EventEnvelope>,
    ) -> Self {
        Self {
            registry,
            factory,
            tx,
        }
    }

    /// Emits an event for a completed operation.
    ///
    /// Returns `Ok(None)` when the kind is not marked replicated: the
    /// operation simply is not replicated, which is never an error. Fails
    /// only when the payload cannot be serialized to the wire format.
    pub fn emit<P>(
        &self,
        kind: &OperationKind,
        payload: &P,
    ) -> Result<Option<EventId>, EventError>
    where
        P: Serialize + ?Sized,
    {
        if !self.registry.is_replicated(kind) {
            debug!(kind = %kind, "Kind not marked replicated, skipping emission");
            return Ok(None);
        }

        let envelope = self.factory.build(kind, payload)?;
        let event_id = envelope.event_id;

        match self.tx.try_send(envelope) {
            Ok(()) => Ok(Some(event_id)),
            Err(TrySendError::Full(_)) => {
                // Overflow must not fail the business operation; the loss is
                // reported, not propagated.
                error!(
                    event_id = %event_id,
                    kind = %kind,
                    "Emission queue full, dropping event"
                );
                Ok(Some(event_id))
            }
            Err(TrySendError::Closed(_)) => {
                error!(
                    event_id = %event_id,
                    kind = %kind,
                    "Dispatch worker stopped, dropping event"
                );
                Ok(Some(event_id))
            }
        }
    }

    /// Returns whether a kind is marked replicated.
    pub fn is_replicated(&self, kind: &OperationKind) -> bool {
        self.registry.is_replicated(kind)
    }
}
