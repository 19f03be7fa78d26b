//! # relay-events
//!
//! Event envelopes, kind registry, and sequencing for the relay engine.
//!
//! ## Design Principles
//!
//! - Events are immutable records of completed operations
//! - Every event carries a per-kind monotonic sequence for total ordering
//! - Which operation kinds are replicated is decided once, at startup
//! - An unregistered kind is simply not replicated, never an error
//!
//! ## Event Envelope
//!
//! All events share a common envelope with:
//! - A globally unique identity (`event_id`)
//! - The operation kind that produced it (`kind`)
//! - Per-kind ordering (`sequence`)
//! - The emission timestamp (`created_at`)
//! - A JSON payload (`payload`)
//!
//! The envelope is also the wire format: webhook deliveries POST it as a
//! JSON body verbatim.

mod envelope;
mod error;
mod kind;
mod registry;

pub use envelope::{EnvelopeFactory, EventEnvelope};
pub use error::EventError;
pub use kind::OperationKind;
pub use registry::KindRegistry;
