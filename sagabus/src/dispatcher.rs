//! Per-message dispatch against one saga's trigger table
//!
//! [`SagaDispatcher`] owns the repository handle and the lazily-built
//! [`SagaSchema`]; each [`dispatch`](SagaDispatcher::dispatch) call runs
//! synchronously on the calling thread from conformance check through
//! persistence.

use crate::action::ActionKind;
use crate::bus::MessageBus;
use crate::correlation::SagaFinder;
use crate::error::{Result, SagaError};
use crate::instance::{SagaId, SagaInstance};
use crate::merge::{reconcile, SagaMerger};
use crate::message::SagaMessage;
use crate::repository::SagaRepository;
use crate::schema::{Saga, SagaSchema};

/// What a dispatch did with the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A new instance was created and persisted
    Started {
        /// Identity of the new instance
        id: SagaId,
    },
    /// An existing instance consumed the message and was persisted
    Continued {
        /// Identity of the continued instance
        id: SagaId,
    },
    /// The instance completed and was removed from storage
    Completed {
        /// Identity of the completed instance
        id: SagaId,
    },
    /// The message is declared but no condition matched the current state
    Ignored,
}

/// Dispatches inbound messages to instances of one saga definition
pub struct SagaDispatcher<S: Saga, R: SagaRepository<S::Data>> {
    repository: R,
    schema: Option<SagaSchema<S>>,
    finder: Option<Box<dyn SagaFinder<S::Data>>>,
    merger: Option<Box<dyn SagaMerger<S::Data>>>,
}

impl<S: Saga, R: SagaRepository<S::Data>> SagaDispatcher<S, R> {
    /// Create a dispatcher over the given repository
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            schema: None,
            finder: None,
            merger: None,
        }
    }

    /// Register a custom finder consulted when no correlation rule resolves
    pub fn with_finder(mut self, finder: impl SagaFinder<S::Data> + 'static) -> Self {
        self.finder = Some(Box::new(finder));
        self
    }

    /// Register a merger for reconciling stale stored data versions
    pub fn with_merger(mut self, merger: impl SagaMerger<S::Data> + 'static) -> Self {
        self.merger = Some(Box::new(merger));
        self
    }

    /// The repository this dispatcher persists through
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Dispatch one inbound message, blocking until persistence finishes
    pub fn dispatch(
        &mut self,
        bus: &dyn MessageBus,
        message: &dyn SagaMessage,
    ) -> Result<DispatchOutcome> {
        let schema: &SagaSchema<S> = match &mut self.schema {
            Some(schema) => schema,
            slot => slot.insert(SagaSchema::define()?),
        };

        let message_type = message.as_any().type_id();
        let Some(candidate) = schema.candidate_for(message_type) else {
            return Err(SagaError::NotConsumable {
                saga: S::NAME,
                message_type: message.message_type(),
            });
        };
        let suppress_outbound = bus.test_mode();

        // Resolve or create the instance the message belongs to
        let is_start = schema.is_start_message(message_type);
        let guard = candidate.condition.recorder().correlation_guard();
        if !is_start {
            if let Some(guard) = guard {
                if !guard(message.as_any()) {
                    return Err(SagaError::CorrelationFailed {
                        saga: S::NAME,
                        saga_id: None,
                        message_type: message.message_type(),
                    });
                }
            }
        }

        let retrieved = resolve_instance(
            &self.repository,
            schema,
            self.finder.as_deref(),
            message,
            message_type,
        )?;

        let (mut instance, started) = match retrieved {
            Some(retrieved) => {
                if is_start {
                    if let Some(guard) = guard {
                        if !guard(message.as_any()) {
                            return Err(SagaError::CorrelationFailed {
                                saga: S::NAME,
                                saga_id: Some(retrieved.id),
                                message_type: message.message_type(),
                            });
                        }
                    }
                }
                (reconcile(self.merger.as_deref(), retrieved, message), false)
            }
            None if is_start => (SagaInstance::<S::Data>::new(), true),
            None => {
                return Err(SagaError::InstanceNotFound {
                    saga: S::NAME,
                    message_type: message.message_type(),
                });
            }
        };

        let Some(trigger) = schema.resolve(&instance.state, message_type) else {
            tracing::debug!(
                saga = S::NAME,
                id = %instance.id,
                state = %instance.state,
                message_type = message.message_type(),
                "no trigger condition matches, ignoring message"
            );
            return Ok(DispatchOutcome::Ignored);
        };

        // Transitions apply before playback so actions observe the new state
        if let Some(record) = trigger.condition.recorder().transition_record() {
            match record.kind {
                ActionKind::Complete => instance.complete(),
                _ => {
                    if let Some(state) = &record.target_state {
                        instance.transition_to(state.clone());
                    }
                }
            }
        }

        if let Some(precondition) = trigger.condition.precondition() {
            if !precondition(&instance) {
                return Err(SagaError::PreconditionFailed {
                    saga: S::NAME,
                    state: instance.state.clone(),
                    message_type: message.message_type(),
                });
            }
        }

        trigger.condition.recorder().play(
            &mut instance,
            message.as_any(),
            bus,
            suppress_outbound,
        )?;

        let id = instance.id;
        let outcome = if instance.is_completed() {
            // an instance that started and completed in one dispatch was
            // never saved, so there is nothing to remove
            if !started {
                self.repository
                    .remove(&id)
                    .map_err(|e| persistence("remove", id, e))?;
            }
            bus.remove_requested_timeouts(id)?;
            DispatchOutcome::Completed { id }
        } else {
            self.repository
                .save(&instance)
                .map_err(|e| persistence("save", id, e))?;
            if started {
                DispatchOutcome::Started { id }
            } else {
                DispatchOutcome::Continued { id }
            }
        };

        tracing::debug!(
            saga = S::NAME,
            id = %id,
            state = %instance.state,
            message_type = message.message_type(),
            outcome = ?outcome,
            "dispatched message"
        );
        Ok(outcome)
    }
}

fn persistence(operation: &'static str, id: SagaId, source: SagaError) -> SagaError {
    SagaError::Persistence {
        operation,
        id,
        source: Box::new(source),
    }
}

/// Resolve the stored instance a message correlates to, rules first, then
/// the custom finder
fn resolve_instance<S: Saga, R: SagaRepository<S::Data>>(
    repository: &R,
    schema: &SagaSchema<S>,
    finder: Option<&dyn SagaFinder<S::Data>>,
    message: &dyn SagaMessage,
    message_type: std::any::TypeId,
) -> Result<Option<SagaInstance<S::Data>>> {
    for rule in schema.rules() {
        if !rule.applies_to(message_type) {
            continue;
        }
        if let Some(key) = rule.key_of_message(message.as_any()) {
            if let Some(found) = repository.find_by_key(rule, &key)? {
                return Ok(Some(found));
            }
        }
    }
    Ok(finder.and_then(|f| f.find(message)))
}

impl<S: Saga, R: SagaRepository<S::Data>> std::fmt::Debug for SagaDispatcher<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaDispatcher")
            .field("saga", &S::NAME)
            .field("schema_built", &self.schema.is_some())
            .field("has_finder", &self.finder.is_some())
            .field("has_merger", &self.merger.is_some())
            .finish()
    }
}
