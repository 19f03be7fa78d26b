//! # relay-dispatch
//!
//! At-least-once webhook delivery engine for replicated events.
//!
//! ## Architecture
//!
//! Emission is fire-and-forget relative to the business operation that
//! produced the event: [`Relay::emit`] checks the kind registry, builds an
//! envelope, and pushes it onto a bounded in-process queue. A background
//! worker ([`Dispatcher::run`]) drains the queue and fans each event out to
//! the active subscribers.
//!
//! Every `(event, subscriber)` pair gets exactly one [`DeliveryAttempt`]
//! record, owned by a single delivery task. The task performs the HTTP send,
//! classifies failures as transient or permanent, sleeps out the exponential
//! backoff between retries, and dead-letters the attempt when the retry
//! budget is exhausted. Single-task ownership is what enforces the
//! at-most-one-in-flight invariant per pair.
//!
//! ## Guarantees
//!
//! - At-least-once delivery to each active subscriber
//! - Dispatch is idempotent on `event_id`
//! - Dead-lettered attempts are retained and queryable, never dropped
//! - Emission never blocks or fails the caller on delivery problems
//!
//! ## Non-Guarantees
//!
//! - Durability across restarts (state is in process memory)
//! - Exactly-once delivery
//! - Distributed coordination

mod attempt;
mod config;
mod dispatcher;
mod engine;
mod error;
mod relay;
mod retry;
mod subscriber;
mod transport;

pub use attempt::{AttemptStore, DeliveryAttempt, DeliveryStatus};
pub use config::DeliveryConfig;
pub use dispatcher::Dispatcher;
pub use engine::DispatchEngine;
pub use error::{AdminError, DeliveryError};
pub use relay::Relay;
pub use retry::RetryPolicy;
pub use subscriber::{Subscriber, SubscriberSet};
pub use transport::{EndpointTransport, HttpTransport};
