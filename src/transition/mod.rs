//! Transition rules and their outcomes.
//!
//! A rule is declared per (state tag, action tag) pair. It receives the
//! current state and the action and answers with a [`TransitionResult`]:
//!
//! - [`TransitionResult::Changed`]: adopt a new state value
//! - [`TransitionResult::Rerun`]: adopt a new state value and re-run the
//!   state's effect even if the tag did not change
//! - [`TransitionResult::Unchanged`]: keep the current value (same reference)
//! - [`TransitionResult::Cancelled`]: ignore the action entirely
//!
//! A rule that fails returns a [`TransitionError`]; the machine turns it into
//! an error state instead of propagating it.

mod table;

pub use table::{GateRejection, UnhandledReason};
pub(crate) use table::{ActionEntry, Resolution, StateEntry, TransitionTable};

use crate::core::State;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a transition rule.
#[derive(Clone, Debug, PartialEq)]
pub enum TransitionResult<S: State> {
    /// Move to a new state value.
    Changed(S),

    /// Move to a new state value and force the effect to run again.
    Rerun(S),

    /// Keep the current state value; nothing downstream runs.
    Unchanged,

    /// Ignore the action.
    Cancelled,
}

impl<S: State> TransitionResult<S> {
    /// Shorthand for [`TransitionResult::Changed`].
    pub fn to(state: S) -> Self {
        Self::Changed(state)
    }

    /// Shorthand for [`TransitionResult::Rerun`].
    pub fn rerun(state: S) -> Self {
        Self::Rerun(state)
    }

    /// The state value this result moves to, if any.
    pub fn target(&self) -> Option<&S> {
        match self {
            Self::Changed(state) | Self::Rerun(state) => Some(state),
            Self::Unchanged | Self::Cancelled => None,
        }
    }

    /// Whether this result asks for a forced effect re-run.
    pub fn is_forced(&self) -> bool {
        matches!(self, Self::Rerun(_))
    }
}

/// Errors a transition rule can report.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransitionError {
    #[error("Transition rejected: {reason}")]
    Rejected { reason: String },

    #[error("Transition failed: {0}")]
    Failed(String),
}

impl TransitionError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// A transition rule.
pub type Rule<S, A> =
    Arc<dyn Fn(&S, &A) -> Result<TransitionResult<S>, TransitionError> + Send + Sync>;

/// Builds the error state adopted when a rule fails.
pub type ErrorStateFn<S> = Arc<dyn Fn(&TransitionError, &S) -> S + Send + Sync>;

/// Picks an action to reroute a failed transition through, if any.
pub type ErrorActionFn<S, A> = Arc<dyn Fn(&TransitionError, &S) -> Option<A> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum Light {
        Red,
        Green,
    }

    impl State for Light {
        fn name(&self) -> &str {
            match self {
                Self::Red => "Red",
                Self::Green => "Green",
            }
        }
    }

    #[test]
    fn target_is_only_set_for_moves() {
        assert_eq!(TransitionResult::to(Light::Green).target(), Some(&Light::Green));
        assert_eq!(TransitionResult::rerun(Light::Red).target(), Some(&Light::Red));
        assert_eq!(TransitionResult::<Light>::Unchanged.target(), None);
        assert_eq!(TransitionResult::<Light>::Cancelled.target(), None);
    }

    #[test]
    fn only_rerun_is_forced() {
        assert!(TransitionResult::rerun(Light::Red).is_forced());
        assert!(!TransitionResult::to(Light::Red).is_forced());
        assert!(!TransitionResult::<Light>::Unchanged.is_forced());
    }

    #[test]
    fn error_messages_are_descriptive() {
        assert_eq!(
            TransitionError::failed("disk full").to_string(),
            "Transition failed: disk full"
        );
        assert_eq!(
            TransitionError::rejected("not ready").to_string(),
            "Transition rejected: not ready"
        );
    }
}
