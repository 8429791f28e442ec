//! Message and endpoint types shared with the bus collaborator

use std::any::Any;

use serde::{Deserialize, Serialize};

/// An object-safe view over any inbound or outbound bus message
///
/// The dispatcher and action records work with type-erased messages and
/// recover the concrete type by downcasting. Any `'static` value that is
/// safe to share across threads qualifies; the blanket implementation means
/// user message structs need no extra trait impls.
pub trait SagaMessage: Send + Sync {
    /// Borrow the message as `Any` for downcasting and type identity
    fn as_any(&self) -> &dyn Any;

    /// Human-readable message type name, used for logging and diagnostics
    fn message_type(&self) -> &'static str;
}

impl<T: Any + Send + Sync> SagaMessage for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn message_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A named destination on the surrounding message bus
///
/// Only an identity to this engine; routing semantics belong to the
/// transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint(String);

impl Endpoint {
    /// Create a new endpoint identity
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Endpoint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
