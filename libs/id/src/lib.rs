//! # relay-id
//!
//! Typed ID types, parsing, and validation for the relay engine.
//!
//! ## Design Principles
//!
//! - IDs are system-generated and never derived from user input
//! - All IDs have a canonical string representation with strict parsing
//! - IDs support roundtrip serialization (parse → format → parse)
//! - IDs are typed to prevent mixing different resource types
//!
//! ## ID Format
//!
//! All resource IDs use a prefixed format: `{prefix}_{uuid}`
//!
//! Examples:
//! - `evt_6f1c2b9e-8d3a-4f6b-9c1d-2e5a7b8c9d0e`
//! - `sub_0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d`
//!
//! The prefix makes log lines and webhook bodies self-describing; the UUID
//! (v4) carries the uniqueness.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export uuid for consumers that need raw UUID operations
pub use uuid::Uuid;
