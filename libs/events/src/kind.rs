//! Operation kinds - identifiers for categories of state-changing actions.

use crate::EventError;

/// An identifier for a category of state-changing action.
///
/// Kinds use dotted names by convention (e.g. `order.created`,
/// `member.removed`). A kind is an opaque key: the engine only ever compares
/// kinds for equality and scopes sequence counters by them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperationKind(String);

impl OperationKind {
    /// Creates a kind from a string.
    ///
    /// The string must be non-empty and contain only ASCII alphanumerics,
    /// `.`, `_`, or `-`.
    pub fn new(s: impl Into<String>) -> Result<Self, EventError> {
        let s = s.into();
        if s.is_empty() {
            return Err(EventError::InvalidKind("kind cannot be empty".to_string()));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(EventError::InvalidKind(format!(
                "kind '{}' contains invalid characters",
                s
            )));
        }
        Ok(Self(s))
    }

    /// Returns the kind as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OperationKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for OperationKind {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for OperationKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for OperationKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}
