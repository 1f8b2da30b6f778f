//! Typed identifiers used across the coordinator.
//!
//! IDs are opaque String wrappers (serde-transparent). Callers may bring
//! their own correlation strings; generated values are UUID v4.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new ID using UUID v4 (random).
            pub fn new_uuid() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new_uuid()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Unique identifier for a published event.
    EventId
);
typed_id!(
    /// Identifier attached by callers to a single tool execution.
    ExecutionId
);
typed_id!(
    /// Conversation/session the execution belongs to.
    SessionId
);
typed_id!(
    /// Thread within a session.
    ThreadId
);
typed_id!(
    /// Identifier of a tool call handed to an external actor.
    PendingCallId
);

/// Handle returned when a listener is attached to the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_new_is_unique() {
        let a = EventId::new_uuid();
        let b = EventId::new_uuid();
        assert_ne!(a, b);
    }

    #[test]
    fn session_id_from_string() {
        let id = SessionId::from_string("test-session");
        assert_eq!(id.as_str(), "test-session");
        assert_eq!(id.to_string(), "test-session");
    }

    #[test]
    fn pending_call_id_from_str_trait() {
        let id: PendingCallId = "call-1".into();
        assert_eq!(id.as_str(), "call-1");
    }

    #[test]
    fn typed_id_serializes_transparently() {
        let id = ExecutionId::from_string("EXEC001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"EXEC001\"");
        let back: ExecutionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn listener_id_display() {
        assert_eq!(ListenerId(7).to_string(), "listener-7");
    }
}
