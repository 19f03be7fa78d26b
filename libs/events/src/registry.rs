//! Registry of operation kinds and their replication flags.

use std::collections::HashMap;

use crate::{EventError, OperationKind};

/// Table mapping operation kinds to their replication flag.
///
/// The registry is populated once at startup, before it is shared with the
/// dispatch engine (typically behind an `Arc`). Because all registration
/// happens through `&mut self`, a shared registry is immutable by
/// construction and lookups need no locking.
#[derive(Debug, Default)]
pub struct KindRegistry {
    kinds: HashMap<OperationKind, bool>,
}

impl KindRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a kind as replicated (or explicitly not replicated).
    ///
    /// Re-registering a kind with the same flag is a no-op. Re-registering
    /// with a conflicting flag returns `EventError::ConflictingRegistration`.
    pub fn register(&mut self, kind: OperationKind, replicated: bool) -> Result<(), EventError> {
        match self.kinds.get(&kind) {
            Some(&existing) if existing != replicated => {
                Err(EventError::ConflictingRegistration {
                    kind: kind.to_string(),
                    existing,
                })
            }
            Some(_) => Ok(()),
            None => {
                self.kinds.insert(kind, replicated);
                Ok(())
            }
        }
    }

    /// Returns whether a kind is marked replicated.
    ///
    /// Unregistered kinds are not replicated. Lookups never fail: a
    /// surprising operation is simply not replicated rather than crashing
    /// the operation that triggered it.
    pub fn is_replicated(&self, kind: &OperationKind) -> bool {
        self.kinds.get(kind).copied().unwrap_or(false)
    }

    /// Returns whether a kind has been registered at all.
    pub fn is_registered(&self, kind: &OperationKind) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Returns the number of registered kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns true if no kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(s: &str) -> OperationKind {
        OperationKind::new(s).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = KindRegistry::new();
        registry.register(kind("order.created"), true).unwrap();

        assert!(registry.is_replicated(&kind("order.created")));
        assert!(registry.is_registered(&kind("order.created")));
    }

    #[test]
    fn test_unregistered_kind_is_not_replicated() {
        let registry = KindRegistry::new();
        assert!(!registry.is_replicated(&kind("order.created")));
        assert!(!registry.is_registered(&kind("order.created")));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = KindRegistry::new();
        registry.register(kind("order.created"), true).unwrap();
        registry.register(kind("order.created"), true).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflicting_flag_fails() {
        let mut registry = KindRegistry::new();
        registry.register(kind("order.created"), true).unwrap();

        let err = registry.register(kind("order.created"), false).unwrap_err();
        assert!(matches!(
            err,
            EventError::ConflictingRegistration { existing: true, .. }
        ));
        // The original registration survives the failed call.
        assert!(registry.is_replicated(&kind("order.created")));
    }

    #[test]
    fn test_explicitly_not_replicated() {
        let mut registry = KindRegistry::new();
        registry.register(kind("audit.viewed"), false).unwrap();

        assert!(!registry.is_replicated(&kind("audit.viewed")));
        assert!(registry.is_registered(&kind("audit.viewed")));
    }

    #[test]
    fn test_lookup_is_referentially_stable() {
        let mut registry = KindRegistry::new();
        registry.register(kind("order.created"), true).unwrap();

        let first = registry.is_replicated(&kind("order.created"));
        for _ in 0..10 {
            assert_eq!(registry.is_replicated(&kind("order.created")), first);
        }
    }
}
