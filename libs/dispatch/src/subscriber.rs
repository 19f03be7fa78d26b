//! Webhook subscribers and the administrative subscriber set.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use relay_id::SubscriberId;
use serde::Serialize;

use crate::AdminError;

/// An external endpoint registered to receive webhook deliveries.
///
/// Subscribers are created and removed by administrative action only; they
/// are not mutated concurrently with delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub endpoint: String,
    pub active: bool,
}

/// The set of registered subscribers.
#[derive(Debug, Default)]
pub struct SubscriberSet {
    inner: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl SubscriberSet {
    /// Creates an empty subscriber set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new active subscriber for the given endpoint.
    ///
    /// The endpoint must parse as an absolute `http` or `https` URL;
    /// anything else is rejected up front rather than dead-lettering every
    /// delivery later.
    pub fn add(&self, endpoint: &str) -> Result<Subscriber, AdminError> {
        let url = reqwest::Url::parse(endpoint).map_err(|e| AdminError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AdminError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let subscriber = Subscriber {
            id: SubscriberId::new(),
            endpoint: endpoint.to_string(),
            active: true,
        };

        self.write().insert(subscriber.id, subscriber.clone());
        Ok(subscriber)
    }

    /// Removes a subscriber entirely.
    pub fn remove(&self, id: &SubscriberId) -> Result<(), AdminError> {
        self.write()
            .remove(id)
            .map(|_| ())
            .ok_or(AdminError::SubscriberNotFound(*id))
    }

    /// Deactivates a subscriber without removing it.
    ///
    /// Pending retries for a deactivated subscriber do not fire.
    pub fn deactivate(&self, id: &SubscriberId) -> Result<(), AdminError> {
        let mut inner = self.write();
        let subscriber = inner
            .get_mut(id)
            .ok_or(AdminError::SubscriberNotFound(*id))?;
        subscriber.active = false;
        Ok(())
    }

    /// Looks up a subscriber by ID.
    pub fn get(&self, id: &SubscriberId) -> Option<Subscriber> {
        self.read().get(id).cloned()
    }

    /// Looks up a subscriber only if it exists and is active.
    pub fn active_subscriber(&self, id: &SubscriberId) -> Option<Subscriber> {
        self.read().get(id).filter(|s| s.active).cloned()
    }

    /// Returns all active subscribers.
    pub fn active(&self) -> Vec<Subscriber> {
        self.read().values().filter(|s| s.active).cloned().collect()
    }

    /// Returns the number of subscribers, active or not.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
