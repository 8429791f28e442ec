//! Trigger conditions and the fluent declaration builder
//!
//! [`when`] opens a trigger condition for one message type and returns the
//! fluent [`TriggerConditionBuilder`]; each chained call appends exactly one
//! action record. The schema host registers the finished condition under a
//! stage (`initially` / `while_in` / `also`).

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::time::Duration;

use crate::action::{ActionFn, ActionKind, ActionRecord, ActionRecorder};
use crate::error::{Result, SagaError};
use crate::instance::{SagaData, SagaInstance};
use crate::message::Endpoint;
use crate::state::State;

/// Declaration stage of a trigger condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Starts a new saga instance
    Initially,
    /// Continues an instance from a specific state
    While,
    /// Continues an instance regardless of its current state
    Also,
}

impl Stage {
    /// Get the string representation of the stage
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initially => "initially",
            Stage::While => "while",
            Stage::Also => "also",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compile-time marker binding a declared event slot to one message type
///
/// At runtime the marker degrades to its label, which is used purely as a
/// human-readable name in logs and diagnostics.
///
/// ```
/// use sagabus::Event;
///
/// struct OrderPlaced;
/// const ORDER_PLACED: Event<OrderPlaced> = Event::new("order_placed");
/// assert_eq!(ORDER_PLACED.label(), "order_placed");
/// ```
pub struct Event<M> {
    label: &'static str,
    _marker: PhantomData<fn(M)>,
}

impl<M> Event<M> {
    /// Declare an event slot with the given label
    pub const fn new(label: &'static str) -> Self {
        Self {
            label,
            _marker: PhantomData,
        }
    }

    /// The slot's human-readable label
    pub const fn label(&self) -> &'static str {
        self.label
    }
}

impl<M> Clone for Event<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for Event<M> {}

impl<M> std::fmt::Debug for Event<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Event").field(&self.label).finish()
    }
}

/// Precondition guard evaluated immediately before actions are played
pub type PreconditionFn<D> = Box<dyn Fn(&SagaInstance<D>) -> bool + Send + Sync>;

/// A declared (message type → ordered action list) mapping
///
/// The associated state is what the resolution algorithm matches against the
/// instance's current state; the registration stage decides how it is set.
pub struct TriggerCondition<D: SagaData> {
    pub(crate) message_type: TypeId,
    pub(crate) message_type_name: &'static str,
    pub(crate) event_label: &'static str,
    pub(crate) associated_state: Option<State>,
    pub(crate) precondition: Option<PreconditionFn<D>>,
    pub(crate) recorder: ActionRecorder<D>,
}

impl<D: SagaData> TriggerCondition<D> {
    /// Type identity of the triggering message
    pub fn message_type(&self) -> TypeId {
        self.message_type
    }

    /// Type name of the triggering message
    pub fn message_type_name(&self) -> &'static str {
        self.message_type_name
    }

    /// Label of the event slot this condition was declared under
    pub fn event_label(&self) -> &'static str {
        self.event_label
    }

    /// The state this condition matches in, if any
    pub fn associated_state(&self) -> Option<&State> {
        self.associated_state.as_ref()
    }

    /// The precondition guard, if the condition was registered guarded
    pub fn precondition(&self) -> Option<&PreconditionFn<D>> {
        self.precondition.as_ref()
    }

    /// The recorded action list
    pub fn recorder(&self) -> &ActionRecorder<D> {
        &self.recorder
    }
}

impl<D: SagaData> std::fmt::Debug for TriggerCondition<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerCondition")
            .field("message_type_name", &self.message_type_name)
            .field("event_label", &self.event_label)
            .field("associated_state", &self.associated_state)
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}

/// A trigger condition registered under a stage
pub struct DefinedTrigger<D: SagaData> {
    /// The registration stage
    pub stage: Stage,
    /// The declared condition
    pub condition: TriggerCondition<D>,
}

impl<D: SagaData> std::fmt::Debug for DefinedTrigger<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinedTrigger")
            .field("stage", &self.stage)
            .field("condition", &self.condition)
            .finish()
    }
}

/// Open a trigger condition for the event's message type
///
/// `handler` is the typed consume hook invoked first at playback; binding it
/// here replaces the original engine's runtime discovery of consume methods.
pub fn when<D, M, H>(event: Event<M>, handler: H) -> TriggerConditionBuilder<D, M>
where
    D: SagaData,
    M: Any + Send + Sync,
    H: Fn(&mut SagaInstance<D>, &M) -> Result<()> + Send + Sync + 'static,
{
    let mut builder = TriggerConditionBuilder {
        condition: TriggerCondition {
            message_type: TypeId::of::<M>(),
            message_type_name: std::any::type_name::<M>(),
            event_label: event.label(),
            associated_state: None,
            precondition: None,
            recorder: ActionRecorder::new(),
        },
        _marker: PhantomData,
    };
    let invocable: ActionFn<D> = Box::new(move |instance, message, _bus| {
        let message = downcast::<M>(message)?;
        handler(instance, message)
    });
    builder.append(ActionRecord::new(ActionKind::When, std::any::type_name::<M>()).with_invocable(invocable));
    builder
}

fn downcast<M: Any>(message: &dyn Any) -> Result<&M> {
    message
        .downcast_ref::<M>()
        .ok_or(SagaError::MessageDowncast {
            expected: std::any::type_name::<M>(),
        })
}

/// Fluent builder returned by [`when`]
///
/// Each chained call appends exactly one action record to the condition's
/// recorder and returns the builder for further chaining.
pub struct TriggerConditionBuilder<D: SagaData, M> {
    condition: TriggerCondition<D>,
    _marker: PhantomData<fn(M)>,
}

impl<D, M> TriggerConditionBuilder<D, M>
where
    D: SagaData,
    M: Any + Send + Sync,
{
    fn append(&mut self, record: ActionRecord<D>) {
        self.condition.recorder.record(record);
    }

    /// Guard against accepting the message onto the wrong conversation
    ///
    /// The predicate is evaluated against the inbound message before
    /// instance data is resolved; returning false fails the dispatch with a
    /// correlation error.
    pub fn correlated_by<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&M) -> bool + Send + Sync + 'static,
    {
        let guard = Box::new(move |message: &dyn Any| {
            message.downcast_ref::<M>().map(&predicate).unwrap_or(false)
        });
        self.append(
            ActionRecord::new(ActionKind::Correlate, std::any::type_name::<M>()).with_guard(guard),
        );
        self
    }

    /// Run arbitrary user logic against the typed message
    pub fn then<F>(self, action: F) -> Self
    where
        F: Fn(&mut SagaInstance<D>, &M) -> Result<()> + Send + Sync + 'static,
    {
        self.then_record(action, None)
    }

    /// Run arbitrary user logic, attaching a note for diagnostics
    pub fn then_noted<F>(self, action: F, note: impl Into<String>) -> Self
    where
        F: Fn(&mut SagaInstance<D>, &M) -> Result<()> + Send + Sync + 'static,
    {
        self.then_record(action, Some(note.into()))
    }

    fn then_record<F>(mut self, action: F, note: Option<String>) -> Self
    where
        F: Fn(&mut SagaInstance<D>, &M) -> Result<()> + Send + Sync + 'static,
    {
        let invocable: ActionFn<D> = Box::new(move |instance, message, _bus| {
            let message = downcast::<M>(message)?;
            action(instance, message)
        });
        let mut record =
            ActionRecord::new(ActionKind::Invoke, std::any::type_name::<M>()).with_invocable(invocable);
        if let Some(note) = note {
            record = record.with_note(note);
        }
        self.append(record);
        self
    }

    /// Publish a message built from the instance and the current message
    pub fn publish<T, F>(mut self, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&SagaInstance<D>, &M) -> T + Send + Sync + 'static,
    {
        let invocable: ActionFn<D> = Box::new(move |instance, message, bus| {
            let message = downcast::<M>(message)?;
            bus.publish(Box::new(build(instance, message)))
        });
        self.append(
            ActionRecord::new(ActionKind::Publish, std::any::type_name::<T>())
                .with_invocable(invocable),
        );
        self
    }

    /// Send a built message to its owning endpoint
    pub fn send<T, F>(mut self, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&SagaInstance<D>, &M) -> T + Send + Sync + 'static,
    {
        let invocable: ActionFn<D> = Box::new(move |instance, message, bus| {
            let message = downcast::<M>(message)?;
            bus.send(Box::new(build(instance, message)))
        });
        self.append(
            ActionRecord::new(ActionKind::Send, std::any::type_name::<T>())
                .with_invocable(invocable),
        );
        self
    }

    /// Send a built message to a specific endpoint
    pub fn send_to_endpoint<T, F>(mut self, endpoint: impl Into<Endpoint>, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&SagaInstance<D>, &M) -> T + Send + Sync + 'static,
    {
        let endpoint = endpoint.into();
        let destination = endpoint.clone();
        let invocable: ActionFn<D> = Box::new(move |instance, message, bus| {
            let message = downcast::<M>(message)?;
            bus.send_to_endpoint(&destination, Box::new(build(instance, message)))
        });
        self.append(
            ActionRecord::new(ActionKind::SendToEndpoint, std::any::type_name::<T>())
                .with_invocable(invocable)
                .with_endpoint(endpoint),
        );
        self
    }

    /// Reply to the sender of the current message with a built message
    pub fn reply<T, F>(mut self, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&SagaInstance<D>, &M) -> T + Send + Sync + 'static,
    {
        let invocable: ActionFn<D> = Box::new(move |instance, message, bus| {
            let message = downcast::<M>(message)?;
            bus.reply(Box::new(build(instance, message)))
        });
        self.append(
            ActionRecord::new(ActionKind::Reply, std::any::type_name::<T>())
                .with_invocable(invocable),
        );
        self
    }

    /// Hand a built message to the external scheduler for re-delivery
    ///
    /// The instance is persisted in its transitioned state immediately; the
    /// delayed message re-enters dispatch as an ordinary inbound message.
    pub fn delay<T, F>(mut self, delay: Duration, build: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&SagaInstance<D>, &M) -> T + Send + Sync + 'static,
    {
        let invocable: ActionFn<D> = Box::new(move |instance, message, bus| {
            let message = downcast::<M>(message)?;
            bus.request_timeout(delay, instance.id, Box::new(build(instance, message)))
        });
        self.append(
            ActionRecord::new(ActionKind::Delay, std::any::type_name::<T>())
                .with_invocable(invocable)
                .with_delay(delay),
        );
        self
    }

    /// Move the instance to a new state before the remaining actions play
    pub fn transition_to(mut self, state: State) -> Self {
        self.condition.associated_state = Some(state.clone());
        self.append(
            ActionRecord::new(ActionKind::Transition, std::any::type_name::<M>())
                .with_target_state(state),
        );
        self
    }

    /// Move the instance to the end state and mark it completed
    ///
    /// Completion makes the dispatcher delete the instance instead of
    /// saving it.
    pub fn complete(mut self) -> Self {
        self.condition.associated_state = Some(State::end());
        self.append(
            ActionRecord::new(ActionKind::Complete, std::any::type_name::<M>())
                .with_target_state(State::end()),
        );
        self
    }

    pub(crate) fn into_condition(self) -> TriggerCondition<D> {
        self.condition
    }
}
