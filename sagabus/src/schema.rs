//! Saga definitions and the trigger table they build
//!
//! A saga names its data type and declares its trigger conditions inside
//! [`Saga::define`]. [`SagaSchema::define`] runs the declaration once and
//! validates it, producing the table the dispatcher resolves against.

use std::any::TypeId;

use crate::correlation::CorrelationRule;
use crate::instance::{SagaData, SagaInstance};
use crate::state::State;
use crate::trigger::{DefinedTrigger, Stage, TriggerConditionBuilder};

/// Errors raised while a saga definition is being declared
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// More than one start condition was declared
    #[error("saga '{saga}' declared more than one initial trigger condition")]
    DuplicateInitially {
        /// Name of the offending saga
        saga: &'static str,
    },
    /// No start condition was declared
    #[error("saga '{saga}' declared no initial trigger condition")]
    MissingInitially {
        /// Name of the offending saga
        saga: &'static str,
    },
}

/// Result type for definition-time operations
pub type DefinitionResult<T> = std::result::Result<T, DefinitionError>;

/// A long-running, message-driven state machine definition
///
/// Implementors declare their trigger conditions and correlation rules in
/// [`define`](Saga::define); the engine never discovers handlers at runtime.
pub trait Saga: Sized + Send + Sync + 'static {
    /// Business data carried by each instance of this saga
    type Data: SagaData;

    /// Name used in logs and error context
    const NAME: &'static str;

    /// Declare the saga's trigger conditions and correlation rules
    fn define(schema: &mut SagaSchema<Self>) -> DefinitionResult<()>;
}

/// The trigger table built from one saga's declarations
pub struct SagaSchema<S: Saga> {
    triggers: Vec<DefinedTrigger<S::Data>>,
    rules: Vec<CorrelationRule<S::Data>>,
}

impl<S: Saga> SagaSchema<S> {
    /// Run the saga's declaration and validate the resulting table
    pub fn define() -> DefinitionResult<Self> {
        let mut schema = Self {
            triggers: Vec::new(),
            rules: Vec::new(),
        };
        S::define(&mut schema)?;
        if !schema
            .triggers
            .iter()
            .any(|t| t.stage == Stage::Initially)
        {
            return Err(DefinitionError::MissingInitially { saga: S::NAME });
        }
        tracing::debug!(
            saga = S::NAME,
            triggers = schema.triggers.len(),
            rules = schema.rules.len(),
            "saga schema defined"
        );
        Ok(schema)
    }

    /// Register the condition that starts new instances
    ///
    /// Exactly one is allowed per saga; the condition matches only while the
    /// instance is in the start state.
    pub fn initially<M>(
        &mut self,
        builder: TriggerConditionBuilder<S::Data, M>,
    ) -> DefinitionResult<()>
    where
        M: std::any::Any + Send + Sync,
    {
        if self.triggers.iter().any(|t| t.stage == Stage::Initially) {
            return Err(DefinitionError::DuplicateInitially { saga: S::NAME });
        }
        let mut condition = builder.into_condition();
        condition.associated_state = Some(State::start());
        self.triggers.push(DefinedTrigger {
            stage: Stage::Initially,
            condition,
        });
        Ok(())
    }

    /// Register a condition that matches regardless of current state
    pub fn also<M>(&mut self, builder: TriggerConditionBuilder<S::Data, M>)
    where
        M: std::any::Any + Send + Sync,
    {
        let mut condition = builder.into_condition();
        condition.associated_state = None;
        self.triggers.push(DefinedTrigger {
            stage: Stage::Also,
            condition,
        });
    }

    /// Register a condition that matches only in the given state
    pub fn while_in<M>(&mut self, state: State, builder: TriggerConditionBuilder<S::Data, M>)
    where
        M: std::any::Any + Send + Sync,
    {
        let mut condition = builder.into_condition();
        condition.associated_state = Some(state);
        self.triggers.push(DefinedTrigger {
            stage: Stage::While,
            condition,
        });
    }

    /// Register a state-bound condition with a precondition guard
    ///
    /// The guard runs against the resolved instance immediately before the
    /// actions play; a false result fails the dispatch.
    pub fn while_in_if<M, P>(
        &mut self,
        state: State,
        precondition: P,
        builder: TriggerConditionBuilder<S::Data, M>,
    ) where
        M: std::any::Any + Send + Sync,
        P: Fn(&SagaInstance<S::Data>) -> bool + Send + Sync + 'static,
    {
        let mut condition = builder.into_condition();
        condition.associated_state = Some(state);
        condition.precondition = Some(Box::new(precondition));
        self.triggers.push(DefinedTrigger {
            stage: Stage::While,
            condition,
        });
    }

    /// Declare equality between a saga data field and a field on message `M`
    pub fn correlate<M, K, FI, FM>(
        &mut self,
        instance_field: &'static str,
        instance_accessor: FI,
        message_field: &'static str,
        message_accessor: FM,
    ) where
        M: std::any::Any + Send + Sync,
        K: ToString,
        FI: Fn(&S::Data) -> K + Send + Sync + 'static,
        FM: Fn(&M) -> K + Send + Sync + 'static,
    {
        self.rules.push(CorrelationRule::new::<M, K, FI, FM>(
            instance_field,
            instance_accessor,
            message_field,
            message_accessor,
        ));
    }

    /// All registered correlation rules
    pub(crate) fn rules(&self) -> &[CorrelationRule<S::Data>] {
        &self.rules
    }

    /// Whether the given message type starts new instances
    pub(crate) fn is_start_message(&self, message_type: TypeId) -> bool {
        self.triggers
            .iter()
            .any(|t| t.stage == Stage::Initially && t.condition.message_type() == message_type)
    }

    /// First-declared condition for the message type, independent of state
    ///
    /// Used for the correlation guard, which must run before instance data
    /// is resolved.
    pub(crate) fn candidate_for(&self, message_type: TypeId) -> Option<&DefinedTrigger<S::Data>> {
        self.triggers
            .iter()
            .find(|t| t.condition.message_type() == message_type)
    }

    /// Resolve the condition matching the current state and message type
    ///
    /// Exact-state stages win over `Also`; among equal matches the first
    /// declared wins.
    pub(crate) fn resolve(
        &self,
        state: &State,
        message_type: TypeId,
    ) -> Option<&DefinedTrigger<S::Data>> {
        let mut fallback = None;
        for trigger in &self.triggers {
            if trigger.condition.message_type() != message_type {
                continue;
            }
            match trigger.stage {
                Stage::Initially => {
                    if state.is_start() {
                        return Some(trigger);
                    }
                }
                Stage::While => {
                    if trigger.condition.associated_state() == Some(state) {
                        return Some(trigger);
                    }
                }
                Stage::Also => {
                    if fallback.is_none() {
                        fallback = Some(trigger);
                    }
                }
            }
        }
        fallback
    }
}

impl<S: Saga> std::fmt::Debug for SagaSchema<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaSchema")
            .field("saga", &S::NAME)
            .field("triggers", &self.triggers)
            .field("rules", &self.rules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::test_helpers::TestData;
    use crate::trigger::{when, Event};

    struct First;
    struct Second;

    const FIRST: Event<First> = Event::new("first");
    const SECOND: Event<Second> = Event::new("second");

    fn consume_first(_: &mut SagaInstance<TestData>, _: &First) -> Result<()> {
        Ok(())
    }

    fn consume_second(_: &mut SagaInstance<TestData>, _: &Second) -> Result<()> {
        Ok(())
    }

    struct TwoStep;

    impl Saga for TwoStep {
        type Data = TestData;
        const NAME: &'static str = "two_step";

        fn define(schema: &mut SagaSchema<Self>) -> DefinitionResult<()> {
            schema.initially(when(FIRST, consume_first).transition_to(State::new("waiting")))?;
            schema.while_in(State::new("waiting"), when(SECOND, consume_second).complete());
            Ok(())
        }
    }

    struct Headless;

    impl Saga for Headless {
        type Data = TestData;
        const NAME: &'static str = "headless";

        fn define(schema: &mut SagaSchema<Self>) -> DefinitionResult<()> {
            schema.also(when(FIRST, consume_first));
            Ok(())
        }
    }

    struct TwoHeads;

    impl Saga for TwoHeads {
        type Data = TestData;
        const NAME: &'static str = "two_heads";

        fn define(schema: &mut SagaSchema<Self>) -> DefinitionResult<()> {
            schema.initially(when(FIRST, consume_first))?;
            schema.initially(when(SECOND, consume_second))?;
            Ok(())
        }
    }

    #[test]
    fn test_define_builds_trigger_table() {
        let schema = SagaSchema::<TwoStep>::define().unwrap();
        assert!(schema.candidate_for(TypeId::of::<First>()).is_some());
        assert!(schema.candidate_for(TypeId::of::<Second>()).is_some());
        assert!(schema.candidate_for(TypeId::of::<u32>()).is_none());
        assert!(schema.is_start_message(TypeId::of::<First>()));
        assert!(!schema.is_start_message(TypeId::of::<Second>()));
    }

    #[test]
    fn test_schema_debug_lists_triggers() {
        let schema = SagaSchema::<TwoStep>::define().unwrap();
        let rendered = format!("{schema:?}");
        assert!(rendered.contains("two_step"));
        assert!(rendered.contains("Initially"));
        assert!(rendered.contains("TriggerCondition"));
    }

    #[test]
    fn test_missing_initially_is_rejected() {
        let err = SagaSchema::<Headless>::define().unwrap_err();
        assert_eq!(err, DefinitionError::MissingInitially { saga: "headless" });
    }

    #[test]
    fn test_duplicate_initially_is_rejected() {
        let err = SagaSchema::<TwoHeads>::define().unwrap_err();
        assert_eq!(err, DefinitionError::DuplicateInitially { saga: "two_heads" });
    }

    #[test]
    fn test_initially_overwrites_associated_state() {
        let schema = SagaSchema::<TwoStep>::define().unwrap();
        let trigger = schema.candidate_for(TypeId::of::<First>()).unwrap();
        assert_eq!(trigger.condition.associated_state(), Some(&State::start()));
        // the transition target survives in the action record
        let record = trigger.condition.recorder().transition_record().unwrap();
        assert_eq!(record.target_state, Some(State::new("waiting")));
    }

    #[test]
    fn test_resolve_prefers_exact_state_over_also() {
        struct Both;

        impl Saga for Both {
            type Data = TestData;
            const NAME: &'static str = "both";

            fn define(schema: &mut SagaSchema<Self>) -> DefinitionResult<()> {
                schema.initially(when(FIRST, consume_first))?;
                schema.also(when(SECOND, consume_second));
                schema.while_in(State::new("open"), when(SECOND, consume_second));
                Ok(())
            }
        }

        let schema = SagaSchema::<Both>::define().unwrap();

        let open = schema
            .resolve(&State::new("open"), TypeId::of::<Second>())
            .unwrap();
        assert_eq!(open.stage, Stage::While);

        let elsewhere = schema
            .resolve(&State::new("closed"), TypeId::of::<Second>())
            .unwrap();
        assert_eq!(elsewhere.stage, Stage::Also);
    }

    #[test]
    fn test_resolve_initially_only_in_start_state() {
        let schema = SagaSchema::<TwoStep>::define().unwrap();
        assert!(schema
            .resolve(&State::start(), TypeId::of::<First>())
            .is_some());
        assert!(schema
            .resolve(&State::new("waiting"), TypeId::of::<First>())
            .is_none());
    }
}
