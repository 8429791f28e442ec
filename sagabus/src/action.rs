//! Recorded action list and playback
//!
//! The fluent builder records each declared effect as a tagged
//! [`ActionRecord`]; at dispatch time the recorder plays the list against a
//! concrete message. Keeping the declaration as data rather than captured
//! control flow makes action ordering testable in isolation from the bus.

use std::any::Any;
use std::time::Duration;

use crate::bus::MessageBus;
use crate::error::Result;
use crate::instance::{SagaData, SagaInstance};
use crate::message::Endpoint;
use crate::state::State;

/// Deferred invocable executed when a record is played
pub type ActionFn<D> =
    Box<dyn Fn(&mut SagaInstance<D>, &dyn Any, &dyn MessageBus) -> Result<()> + Send + Sync>;

/// Correlation guard predicate evaluated against the inbound message
pub type GuardFn = Box<dyn Fn(&dyn Any) -> bool + Send + Sync>;

/// The kind of effect a record represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Forward the message to the declared consume hook
    When,
    /// Run arbitrary user logic against the typed message
    Invoke,
    /// Publish a built message to all subscribers
    Publish,
    /// Send a built message to its owning endpoint
    Send,
    /// Send a built message to a named endpoint
    SendToEndpoint,
    /// Reply to the sender of the current message
    Reply,
    /// Hand a built message to the external scheduler for later re-delivery
    Delay,
    /// Move the instance to a new state
    Transition,
    /// Move the instance to the end state and mark it completed
    Complete,
    /// Guard against accepting a message onto the wrong conversation
    Correlate,
}

impl ActionKind {
    /// Get the string representation of the action kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::When => "when",
            ActionKind::Invoke => "invoke",
            ActionKind::Publish => "publish",
            ActionKind::Send => "send",
            ActionKind::SendToEndpoint => "send_to_endpoint",
            ActionKind::Reply => "reply",
            ActionKind::Delay => "delay",
            ActionKind::Transition => "transition",
            ActionKind::Complete => "complete",
            ActionKind::Correlate => "correlate",
        }
    }

    /// Whether this record is executed during playback
    ///
    /// `Transition`, `Complete`, and `Correlate` records are consumed
    /// separately by the dispatcher; `When` plays first as the consume hook.
    pub fn is_replayed(&self) -> bool {
        !matches!(
            self,
            ActionKind::Transition | ActionKind::Complete | ActionKind::Correlate
        )
    }

    /// Whether playing this record produces externally-visible side effects
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            ActionKind::Publish
                | ActionKind::Send
                | ActionKind::SendToEndpoint
                | ActionKind::Reply
                | ActionKind::Delay
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded effect with its deferred invocable and metadata
pub struct ActionRecord<D: SagaData> {
    /// What the record does at playback
    pub kind: ActionKind,
    /// Type name of the message the record was declared for
    pub message_type: &'static str,
    /// Deferred invocable; absent for records the dispatcher consumes itself
    pub invocable: Option<ActionFn<D>>,
    /// Correlation guard predicate (`Correlate` only)
    pub guard: Option<GuardFn>,
    /// Target state (`Transition` and `Complete` only)
    pub target_state: Option<State>,
    /// Destination endpoint (`SendToEndpoint` only)
    pub endpoint: Option<Endpoint>,
    /// Scheduler delay (`Delay` only)
    pub delay: Option<Duration>,
    /// Free-form note attached at declaration time
    pub note: Option<String>,
}

impl<D: SagaData> ActionRecord<D> {
    /// Create a record with no metadata beyond its kind and message type
    pub fn new(kind: ActionKind, message_type: &'static str) -> Self {
        Self {
            kind,
            message_type,
            invocable: None,
            guard: None,
            target_state: None,
            endpoint: None,
            delay: None,
            note: None,
        }
    }

    /// Attach the deferred invocable
    pub fn with_invocable(mut self, invocable: ActionFn<D>) -> Self {
        self.invocable = Some(invocable);
        self
    }

    /// Attach the correlation guard predicate
    pub fn with_guard(mut self, guard: GuardFn) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Attach the target state
    pub fn with_target_state(mut self, state: State) -> Self {
        self.target_state = Some(state);
        self
    }

    /// Attach the destination endpoint
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Attach the scheduler delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Attach a free-form note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl<D: SagaData> std::fmt::Debug for ActionRecord<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRecord")
            .field("kind", &self.kind)
            .field("message_type", &self.message_type)
            .field("target_state", &self.target_state)
            .field("endpoint", &self.endpoint)
            .field("delay", &self.delay)
            .field("note", &self.note)
            .finish_non_exhaustive()
    }
}

/// Ordered list of action records for one trigger condition
///
/// Accumulated while the fluent builder runs at declaration time, then
/// played in declaration order against each matching inbound message.
pub struct ActionRecorder<D: SagaData> {
    records: Vec<ActionRecord<D>>,
}

impl<D: SagaData> ActionRecorder<D> {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a record, preserving declaration order
    pub fn record(&mut self, record: ActionRecord<D>) {
        self.records.push(record);
    }

    /// Borrow the recorded list
    pub fn records(&self) -> &[ActionRecord<D>] {
        &self.records
    }

    /// The first `Transition` or `Complete` record, if any
    pub fn transition_record(&self) -> Option<&ActionRecord<D>> {
        self.records
            .iter()
            .find(|r| matches!(r.kind, ActionKind::Transition | ActionKind::Complete))
    }

    /// The correlation guard declared via `correlated_by`, if any
    pub fn correlation_guard(&self) -> Option<&GuardFn> {
        self.records
            .iter()
            .find(|r| r.kind == ActionKind::Correlate)
            .and_then(|r| r.guard.as_ref())
    }

    /// Play the replayable records in declaration order
    ///
    /// `Transition`, `Complete`, and `Correlate` records are skipped here
    /// because the dispatcher consumes them before playback. When
    /// `suppress_outbound` is set, records with externally-visible effects
    /// are skipped as well.
    pub fn play(
        &self,
        instance: &mut SagaInstance<D>,
        message: &dyn Any,
        bus: &dyn MessageBus,
        suppress_outbound: bool,
    ) -> Result<()> {
        for record in &self.records {
            if !record.kind.is_replayed() {
                continue;
            }
            if suppress_outbound && record.kind.is_outbound() {
                tracing::debug!(
                    action = record.kind.as_str(),
                    message_type = record.message_type,
                    "suppressing outbound action in test mode"
                );
                continue;
            }
            if let Some(invocable) = &record.invocable {
                tracing::debug!(
                    action = record.kind.as_str(),
                    message_type = record.message_type,
                    note = record.note.as_deref(),
                    "playing action"
                );
                invocable(instance, message, bus)?;
            }
        }
        Ok(())
    }
}

impl<D: SagaData> Default for ActionRecorder<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: SagaData> std::fmt::Debug for ActionRecorder<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRecorder")
            .field("records", &self.records)
            .finish()
    }
}
