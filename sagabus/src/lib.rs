//! # Sagabus
//!
//! A saga orchestration engine for message-bus middleware.
//!
//! ## Features
//!
//! - **Fluent Declarations**: Sagas declare trigger conditions with a
//!   `when(event).then(..).transition_to(..)` builder interpreted into a
//!   trigger table, not executed directly
//! - **Correlation**: Declarative field-equality rules route inbound
//!   messages to the right instance, with a custom finder fallback
//! - **Version Merge**: Stored instances persisted by older data shapes are
//!   reconciled through an optional merge hook
//! - **Pluggable Persistence**: In-memory and filesystem repositories out of
//!   the box, any backend via the `SagaRepository` trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sagabus::{
//!     when, DefinitionResult, Event, Saga, SagaInstance, SagaSchema, State,
//! };
//!
//! #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
//! struct OrderData {
//!     order: String,
//! }
//!
//! impl sagabus::SagaData for OrderData {}
//!
//! struct PlaceOrder {
//!     order: String,
//! }
//!
//! struct ShipOrder {
//!     order: String,
//! }
//!
//! const PLACE_ORDER: Event<PlaceOrder> = Event::new("place_order");
//! const SHIP_ORDER: Event<ShipOrder> = Event::new("ship_order");
//!
//! struct OrderSaga;
//!
//! impl Saga for OrderSaga {
//!     type Data = OrderData;
//!     const NAME: &'static str = "order";
//!
//!     fn define(schema: &mut SagaSchema<Self>) -> DefinitionResult<()> {
//!         schema.correlate::<ShipOrder, _, _, _>(
//!             "order",
//!             |data| data.order.clone(),
//!             "order",
//!             |message| message.order.clone(),
//!         );
//!         schema.initially(
//!             when(
//!                 PLACE_ORDER,
//!                 |instance: &mut SagaInstance<OrderData>, message: &PlaceOrder| {
//!                     instance.data.order = message.order.clone();
//!                     Ok(())
//!                 },
//!             )
//!             .transition_to(State::new("placed")),
//!         )?;
//!         schema.while_in(
//!             State::new("placed"),
//!             when(
//!                 SHIP_ORDER,
//!                 |_instance: &mut SagaInstance<OrderData>, _message: &ShipOrder| Ok(()),
//!             )
//!             .complete(),
//!         );
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Dispatch messages with a [`SagaDispatcher`] over a [`SagaRepository`]
//! backend and a [`MessageBus`] implementation.

#![warn(missing_docs)]

/// Recorded actions and ordered playback
pub mod action;

/// Bus collaborator interface
pub mod bus;

/// Correlation rules and custom finders
pub mod correlation;

/// Per-message dispatch
pub mod dispatcher;

/// Error types for the engine
pub mod error;

/// Saga instances and their business data
pub mod instance;

/// Optimistic version merge between data shapes
pub mod merge;

/// Message and endpoint abstractions
pub mod message;

/// Instance persistence backends
pub mod repository;

/// Saga definitions and trigger tables
pub mod schema;

/// Saga states
pub mod state;

/// Trigger conditions and the fluent builder
pub mod trigger;

#[cfg(test)]
mod test_helpers;

// Re-export core types
pub use action::{ActionKind, ActionRecord, ActionRecorder};
pub use bus::MessageBus;
pub use correlation::{CorrelationRule, SagaFinder};
pub use dispatcher::{DispatchOutcome, SagaDispatcher};
pub use error::{Result, SagaError};
pub use instance::{SagaData, SagaId, SagaInstance};
pub use merge::{reconcile, SagaMerger};
pub use message::{Endpoint, SagaMessage};
pub use repository::{FileSystemSagaRepository, MemorySagaRepository, SagaRepository};
pub use schema::{DefinitionError, DefinitionResult, Saga, SagaSchema};
pub use state::State;
pub use trigger::{when, Event, Stage, TriggerCondition, TriggerConditionBuilder};

/// Version of the sagabus library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
