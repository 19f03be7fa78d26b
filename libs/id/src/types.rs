//! Typed ID definitions for the relay engine.
//!
//! Each ID type has a unique prefix that identifies the resource type.

use crate::define_id;

define_id!(EventId, "evt");
define_id!(SubscriberId, "sub");
