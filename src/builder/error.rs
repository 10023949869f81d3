//! Build errors for machines.

use crate::error::MachineError;
use thiserror::Error;

/// A problem found while building a machine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    #[error("Initial state not specified. Call .initial(state) or .initial_with(f) before .build()")]
    MissingInitialState,

    #[error("Error state not specified. Call .error_state(f) before .build()")]
    MissingErrorState,

    #[error("State {tag} is configured more than once")]
    DuplicateState { tag: String },

    #[error("Action {action} is declared more than once in state {state}")]
    DuplicateAction { state: String, action: String },

    #[error("Command {tag} is registered more than once")]
    DuplicateCommand { tag: String },

    #[error("Machine failed to start: {0}")]
    Boot(#[from] MachineError),
}

/// Every problem found by [`MachineBuilder::build`](super::MachineBuilder::build).
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{}", join(.0))]
pub struct BuildErrors(pub Vec<BuildError>);

impl BuildErrors {
    pub fn errors(&self) -> &[BuildError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, error: &BuildError) -> bool {
        self.0.contains(error)
    }
}

impl From<BuildError> for BuildErrors {
    fn from(error: BuildError) -> Self {
        Self(vec![error])
    }
}

fn join(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_joined_in_order() {
        let errors = BuildErrors(vec![
            BuildError::MissingErrorState,
            BuildError::DuplicateState {
                tag: "Home".to_string(),
            },
        ]);

        assert_eq!(
            errors.to_string(),
            "Error state not specified. Call .error_state(f) before .build(); \
             State Home is configured more than once"
        );
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&BuildError::MissingErrorState));
    }

    #[test]
    fn boot_failures_wrap_machine_errors() {
        let error: BuildErrors = BuildError::from(MachineError::MaxRecursiveDispatchReached {
            limit: 1,
        })
        .into();

        assert_eq!(
            error.errors(),
            &[BuildError::Boot(MachineError::MaxRecursiveDispatchReached { limit: 1 })]
        );
    }
}
