//! Bus collaborator interface
//!
//! The engine never owns a transport; it invokes these primitives at action
//! playback time and leaves routing, serialization, and delivery to the
//! surrounding bus.

use std::time::Duration;

use crate::error::Result;
use crate::instance::SagaId;
use crate::message::{Endpoint, SagaMessage};

/// The message-bus primitives available to recorded actions
///
/// Implementations must be safe for concurrent use by multiple dispatches.
/// `request_timeout` hands a message to the external scheduler for
/// re-delivery; the delayed message later re-enters dispatch as an ordinary
/// inbound message.
pub trait MessageBus: Send + Sync {
    /// The bus's own endpoint identity, used for logging and labeling only
    fn endpoint(&self) -> Endpoint;

    /// Publish a message to all subscribers
    fn publish(&self, message: Box<dyn SagaMessage>) -> Result<()>;

    /// Send a message to its owning endpoint
    fn send(&self, message: Box<dyn SagaMessage>) -> Result<()>;

    /// Send a message to a specific endpoint
    fn send_to_endpoint(&self, endpoint: &Endpoint, message: Box<dyn SagaMessage>) -> Result<()>;

    /// Reply to the sender of the message currently being dispatched
    fn reply(&self, message: Box<dyn SagaMessage>) -> Result<()>;

    /// Schedule a message for re-delivery after `delay`, keyed by the saga
    /// instance so outstanding timeouts can be removed on completion
    fn request_timeout(
        &self,
        delay: Duration,
        saga: SagaId,
        message: Box<dyn SagaMessage>,
    ) -> Result<()>;

    /// Remove all outstanding timeout registrations for a saga instance
    ///
    /// Invoked by the dispatcher when an instance completes.
    fn remove_requested_timeouts(&self, saga: SagaId) -> Result<()>;

    /// Whether externally-visible side effects should be suppressed
    ///
    /// Explicit capability flag for test scenarios; the dispatcher skips
    /// outbound action records when this returns true.
    fn test_mode(&self) -> bool {
        false
    }
}
