//! Guard predicates for controlling transitions.
//!
//! A guard sits in front of a transition rule. When it rejects, the action is
//! treated as declined by the rule: the machine ignores it without touching
//! effects, commands or subscribers.

use super::action::Action;
use super::state::State;
use std::marker::PhantomData;
use std::sync::Arc;

/// Pure predicate over the current state and the incoming action.
///
/// # Example
///
/// ```rust
/// use switchyard::core::{Action, Guard, State};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Door {
///     Closed { locked: bool },
///     Open,
/// }
///
/// impl State for Door {
///     fn name(&self) -> &str {
///         match self {
///             Self::Closed { .. } => "Closed",
///             Self::Open => "Open",
///         }
///     }
/// }
///
/// #[derive(Clone, Debug)]
/// struct Push;
///
/// impl Action for Push {
///     fn name(&self) -> &str {
///         "Push"
///     }
/// }
///
/// let unlocked = Guard::new(|door: &Door, _: &Push| {
///     matches!(door, Door::Closed { locked: false })
/// });
///
/// assert!(unlocked.check(&Door::Closed { locked: false }, &Push));
/// assert!(!unlocked.check(&Door::Closed { locked: true }, &Push));
/// ```
pub struct Guard<S: State, A: Action> {
    predicate: Arc<dyn Fn(&S, &A) -> bool + Send + Sync>,
    _phantom: PhantomData<fn(&S, &A)>,
}

impl<S: State, A: Action> Guard<S, A> {
    /// Create a guard from a pure predicate function.
    ///
    /// The predicate must be deterministic and thread-safe (Send + Sync).
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&S, &A) -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Arc::new(predicate),
            _phantom: PhantomData,
        }
    }

    /// Guard that only looks at the current state.
    pub fn on_state<F>(predicate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        Self::new(move |state, _| predicate(state))
    }

    /// Check if the guard lets `action` through while in `state`.
    pub fn check(&self, state: &S, action: &A) -> bool {
        (self.predicate)(state, action)
    }
}

impl<S: State, A: Action> Clone for Guard<S, A> {
    fn clone(&self) -> Self {
        Self {
            predicate: Arc::clone(&self.predicate),
            _phantom: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum TestState {
        Initial,
        Processing,
        Complete,
        Failed,
    }

    impl State for TestState {
        fn name(&self) -> &str {
            match self {
                Self::Initial => "Initial",
                Self::Processing => "Processing",
                Self::Complete => "Complete",
                Self::Failed => "Failed",
            }
        }

        fn is_final(&self) -> bool {
            matches!(self, Self::Complete | Self::Failed)
        }
    }

    #[derive(Clone, Debug)]
    enum TestAction {
        Advance { force: bool },
    }

    impl Action for TestAction {
        fn name(&self) -> &str {
            "Advance"
        }
    }

    #[test]
    fn guard_allows_matching_states() {
        let guard = Guard::on_state(|s: &TestState| matches!(s, TestState::Initial));
        let action = TestAction::Advance { force: false };

        assert!(guard.check(&TestState::Initial, &action));
        assert!(!guard.check(&TestState::Processing, &action));
    }

    #[test]
    fn guard_can_inspect_action_payload() {
        let guard = Guard::new(|s: &TestState, a: &TestAction| match a {
            TestAction::Advance { force } => *force || !s.is_final(),
        });

        assert!(guard.check(&TestState::Processing, &TestAction::Advance { force: false }));
        assert!(!guard.check(&TestState::Failed, &TestAction::Advance { force: false }));
        assert!(guard.check(&TestState::Failed, &TestAction::Advance { force: true }));
    }

    #[test]
    fn guard_is_deterministic() {
        let guard = Guard::on_state(|s: &TestState| !s.is_final());
        let action = TestAction::Advance { force: false };

        let result1 = guard.check(&TestState::Complete, &action);
        let result2 = guard.check(&TestState::Complete, &action);

        assert_eq!(result1, result2);
    }

    #[test]
    fn cloned_guard_shares_predicate() {
        let guard = Guard::on_state(|s: &TestState| matches!(s, TestState::Initial));
        let cloned = guard.clone();
        let action = TestAction::Advance { force: false };

        assert_eq!(
            guard.check(&TestState::Initial, &action),
            cloned.check(&TestState::Initial, &action)
        );
    }
}
