//! State values identifying positions in a saga's workflow

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the reserved start state
const START_STATE: &str = "start";

/// Name of the reserved end state
const END_STATE: &str = "end";

/// Errors that can occur when creating state values
#[derive(Debug, Error)]
pub enum StateError {
    /// State name cannot be empty or whitespace only
    #[error("State name cannot be empty or whitespace only")]
    EmptyStateName,
}

/// Result type for state operations
pub type StateResult<T> = Result<T, StateError>;

/// A named position in a saga's workflow
///
/// States are value-equal by name and immutable once constructed. Two names
/// are reserved: the start state every new instance begins in, and the end
/// state a completed instance transitions to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State(String);

impl State {
    /// Create a new state
    ///
    /// # Panics
    /// Panics if the name is empty or whitespace only. For non-panicking
    /// creation, use `try_new` instead.
    pub fn new(name: impl Into<String>) -> Self {
        Self::try_new(name).expect("State name cannot be empty or whitespace only")
    }

    /// Create a new state, returning an error for invalid input
    pub fn try_new(name: impl Into<String>) -> StateResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StateError::EmptyStateName);
        }
        Ok(Self(name))
    }

    /// The reserved state every freshly created instance starts in
    pub fn start() -> Self {
        Self(START_STATE.to_string())
    }

    /// The reserved state a completed instance transitions to
    pub fn end() -> Self {
        Self(END_STATE.to_string())
    }

    /// Whether this is the reserved start state
    pub fn is_start(&self) -> bool {
        self.0 == START_STATE
    }

    /// Whether this is the reserved end state
    pub fn is_end(&self) -> bool {
        self.0 == END_STATE
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Conversions validate like `new` and panic on empty names
impl From<String> for State {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for State {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_creation() {
        let s1 = State::new("waiting_for_payment");
        let s2 = State::from("waiting_for_payment");
        let s3: State = "waiting_for_payment".into();

        assert_eq!(s1, s2);
        assert_eq!(s2, s3);
        assert_eq!(s1.as_str(), "waiting_for_payment");
    }

    #[test]
    fn test_state_try_new_empty_error() {
        assert!(State::try_new("").is_err());
        assert!(State::try_new("   ").is_err());
        assert!(State::try_new("\t\n").is_err());
    }

    #[test]
    #[should_panic(expected = "State name cannot be empty or whitespace only")]
    fn test_state_new_panics_on_empty() {
        State::new("");
    }

    #[test]
    #[should_panic(expected = "State name cannot be empty or whitespace only")]
    fn test_state_from_validates_like_new() {
        let _ = State::from("   ");
    }

    #[test]
    fn test_reserved_states() {
        assert!(State::start().is_start());
        assert!(State::end().is_end());
        assert!(!State::new("processing").is_start());
        assert_ne!(State::start(), State::end());
    }

    #[test]
    fn test_state_serialization() {
        let state = State::new("awaiting_confirmation");
        let serialized = serde_json::to_string(&state).unwrap();
        let deserialized: State = serde_json::from_str(&serialized).unwrap();
        assert_eq!(state, deserialized);
    }
}
