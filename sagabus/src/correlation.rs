//! Correlation rules and the custom finder fallback
//!
//! A correlation rule pairs an accessor on the saga's data with an accessor
//! on one inbound message type. Keys are compared through their string
//! rendering so rules over different key types can live in one table.

use std::any::{Any, TypeId};

use crate::instance::{SagaData, SagaInstance};
use crate::message::SagaMessage;

type MessageKeyFn = Box<dyn Fn(&dyn Any) -> Option<String> + Send + Sync>;
type InstanceKeyFn<D> = Box<dyn Fn(&D) -> String + Send + Sync>;

/// Declared equality between a saga data field and a message field
pub struct CorrelationRule<D: SagaData> {
    instance_field: &'static str,
    message_field: &'static str,
    message_type: TypeId,
    message_type_name: &'static str,
    message_key: MessageKeyFn,
    instance_key: InstanceKeyFn<D>,
}

impl<D: SagaData> CorrelationRule<D> {
    /// Declare a rule for message type `M` with key type `K`
    pub fn new<M, K, FI, FM>(
        instance_field: &'static str,
        instance_accessor: FI,
        message_field: &'static str,
        message_accessor: FM,
    ) -> Self
    where
        M: Any + Send + Sync,
        K: ToString,
        FI: Fn(&D) -> K + Send + Sync + 'static,
        FM: Fn(&M) -> K + Send + Sync + 'static,
    {
        Self {
            instance_field,
            message_field,
            message_type: TypeId::of::<M>(),
            message_type_name: std::any::type_name::<M>(),
            message_key: Box::new(move |message| {
                message
                    .downcast_ref::<M>()
                    .map(|m| message_accessor(m).to_string())
            }),
            instance_key: Box::new(move |data| instance_accessor(data).to_string()),
        }
    }

    /// The saga data field this rule correlates on
    pub fn instance_field(&self) -> &'static str {
        self.instance_field
    }

    /// The message field this rule correlates on
    pub fn message_field(&self) -> &'static str {
        self.message_field
    }

    /// Whether this rule applies to the given message type
    pub fn applies_to(&self, message_type: TypeId) -> bool {
        self.message_type == message_type
    }

    /// Extract the correlation key from a message, if the type matches
    pub fn key_of_message(&self, message: &dyn Any) -> Option<String> {
        (self.message_key)(message)
    }

    /// Extract the correlation key from an instance's data
    pub fn key_of_instance(&self, instance: &SagaInstance<D>) -> String {
        (self.instance_key)(&instance.data)
    }

    /// Whether the instance carries the given correlation key
    pub fn matches(&self, instance: &SagaInstance<D>, key: &str) -> bool {
        self.key_of_instance(instance) == key
    }
}

impl<D: SagaData> std::fmt::Debug for CorrelationRule<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationRule")
            .field("instance_field", &self.instance_field)
            .field("message_field", &self.message_field)
            .field("message_type_name", &self.message_type_name)
            .finish_non_exhaustive()
    }
}

/// Custom instance lookup consulted when no correlation rule resolves
///
/// Implementations typically hold their own repository handle and run a
/// query the declarative rules cannot express.
pub trait SagaFinder<D: SagaData>: Send + Sync {
    /// Find the instance the message belongs to, if any
    fn find(&self, message: &dyn SagaMessage) -> Option<SagaInstance<D>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestData;

    struct AccountOpened {
        account: String,
    }

    fn account_rule() -> CorrelationRule<TestData> {
        CorrelationRule::new::<AccountOpened, _, _, _>(
            "account",
            |data: &TestData| data.account.clone(),
            "account",
            |message: &AccountOpened| message.account.clone(),
        )
    }

    #[test]
    fn test_rule_extracts_matching_keys() {
        let rule = account_rule();
        let message = AccountOpened {
            account: "acct-7".to_string(),
        };

        assert_eq!(rule.key_of_message(&message), Some("acct-7".to_string()));

        let mut instance = SagaInstance::<TestData>::new();
        instance.data.account = "acct-7".to_string();
        assert!(rule.matches(&instance, "acct-7"));
        assert!(!rule.matches(&instance, "acct-8"));
    }

    #[test]
    fn test_rule_ignores_foreign_message_types() {
        let rule = account_rule();
        assert!(!rule.applies_to(TypeId::of::<u32>()));
        assert_eq!(rule.key_of_message(&42u32), None);
    }
}
