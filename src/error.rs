//! Runtime errors of a machine.

use crate::commands::CommandId;
use crate::transition::{GateRejection, UnhandledReason};
use std::fmt;
use thiserror::Error;

/// Which effect a cleanup belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectScope {
    /// The effect of the current state.
    State,
    /// The machine-wide effect started at construction.
    Global,
}

impl fmt::Display for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State => f.write_str("state"),
            Self::Global => f.write_str("global"),
        }
    }
}

/// Errors returned by machine operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MachineError {
    #[error("Cannot dispatch {action} while a transition out of {state} is running")]
    DispatchInTransition { state: String, action: String },

    #[error("More than {limit} recursive dispatches in one call")]
    MaxRecursiveDispatchReached { limit: usize },

    #[error("Dispatch queue not empty after draining ({remaining} steps left)")]
    UnexpectedDispatchQueue { remaining: usize },

    #[error("Machine destroyed; {operation} is not available")]
    Destroyed { operation: &'static str },

    #[error("Action {action} not handled in state {state}: {reason}")]
    UnhandledAction {
        state: String,
        action: String,
        reason: UnhandledReason,
    },

    #[error("Command {command} not allowed in state {state}: {reason}")]
    UnhandledCommand {
        state: String,
        command: String,
        reason: GateRejection,
    },

    #[error("Shortcut from {from} to {to} not allowed: {reason}")]
    UnhandledShortcut {
        from: String,
        to: String,
        reason: GateRejection,
    },

    #[error("The {scope} effect cleanup vetoed teardown during destroy")]
    CleanupVetoedOnDestroy { scope: EffectScope },

    #[error("Command {id} cannot be stopped before its function returns")]
    StopBeforeRegistered { id: CommandId },

    #[error("Command {command} returned no cancel callback and cannot be stopped")]
    CommandNotCancellable { command: String },
}

impl MachineError {
    /// Whether the error aborted a dispatch and rolled the state back.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DispatchInTransition { .. }
                | Self::MaxRecursiveDispatchReached { .. }
                | Self::UnexpectedDispatchQueue { .. }
                | Self::CleanupVetoedOnDestroy { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_tags() {
        let err = MachineError::UnhandledAction {
            state: "Bed".to_string(),
            action: "Commute".to_string(),
            reason: UnhandledReason::ActionNotDeclared,
        };
        assert_eq!(
            err.to_string(),
            "Action Commute not handled in state Bed: action not declared"
        );

        let err = MachineError::CleanupVetoedOnDestroy {
            scope: EffectScope::Global,
        };
        assert_eq!(
            err.to_string(),
            "The global effect cleanup vetoed teardown during destroy"
        );
    }

    #[test]
    fn reentrancy_errors_are_fatal() {
        assert!(MachineError::MaxRecursiveDispatchReached { limit: 3 }.is_fatal());
        assert!(!MachineError::Destroyed {
            operation: "dispatch"
        }
        .is_fatal());
    }
}
