//! Unified error handling for the sagabus library
//!
//! Fatal dispatch errors propagate to the invoking layer, which owns fault
//! routing and dead-lettering. Non-fatal conditions (merge fallback, messages
//! with no matching trigger condition) are absorbed and only observable
//! through logging.

use thiserror::Error;

use crate::instance::SagaId;
use crate::schema::DefinitionError;
use crate::state::State;

/// The main error type for the sagabus library
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError {
    /// The inbound message type is not declared as a start or continuation
    /// input of the saga
    #[error("message type '{message_type}' is not consumable by saga '{saga}'")]
    NotConsumable {
        /// Saga type name
        saga: &'static str,
        /// Inbound message type name
        message_type: &'static str,
    },

    /// A continuation message arrived but neither the correlation rules nor
    /// the custom finder located an instance
    #[error("no instance of saga '{saga}' found for continuation message '{message_type}'")]
    InstanceNotFound {
        /// Saga type name
        saga: &'static str,
        /// Inbound message type name
        message_type: &'static str,
    },

    /// A `correlated_by` guard rejected the inbound message
    #[error("message '{message_type}' could not be correlated to the ongoing instance of saga '{saga}'")]
    CorrelationFailed {
        /// Saga type name
        saga: &'static str,
        /// Instance the message was tentatively matched against, if resolved
        saga_id: Option<SagaId>,
        /// Inbound message type name
        message_type: &'static str,
    },

    /// A guarded `while_in_if` precondition evaluated to false
    #[error("precondition failed for saga '{saga}' in state '{state}' on message '{message_type}'")]
    PreconditionFailed {
        /// Saga type name
        saga: &'static str,
        /// Instance state at the time of evaluation
        state: State,
        /// Inbound message type name
        message_type: &'static str,
    },

    /// An action record received a message of an unexpected concrete type
    #[error("expected message of type '{expected}'")]
    MessageDowncast {
        /// The message type the action was declared for
        expected: &'static str,
    },

    /// Saga definition error raised while building the trigger table
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Repository save/remove failed after the dispatch mutated the instance
    ///
    /// Surfaced as a distinct variant so the invoking layer can retry or
    /// dead-letter instead of silently diverging from durable state.
    #[error("persistence {operation} failed for saga instance {id}: {source}")]
    Persistence {
        /// The repository operation that failed ("save" or "remove")
        operation: &'static str,
        /// The instance the operation targeted
        id: SagaId,
        /// The underlying repository error
        #[source]
        source: Box<SagaError>,
    },

    /// Repository backend error
    #[error("storage error: {0}")]
    Storage(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A `Result` alias with [`SagaError`] as the error type
pub type Result<T> = std::result::Result<T, SagaError>;
