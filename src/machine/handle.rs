//! Weak handle used by effects, commands and background tasks.

use super::{Machine, Shared, Step};
use crate::commands::{CommandId, StopHandle};
use crate::core::{Action, Command, NoCommand, State};
use crate::error::MachineError;
use std::sync::{Arc, Weak};

/// Handle to a machine that does not keep it alive.
///
/// Once every [`Machine`] handle is gone, calls through a dispatcher are
/// ignored with a warning.
pub struct Dispatcher<S: State, A: Action, C: Command = NoCommand> {
    shared: Weak<Shared<S, A, C>>,
}

impl<S: State, A: Action, C: Command> Dispatcher<S, A, C> {
    pub(crate) fn new(shared: Weak<Shared<S, A, C>>) -> Self {
        Self { shared }
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            shared: Weak::new(),
        }
    }

    /// Same as [`Machine::dispatch`].
    pub fn dispatch(&self, action: A) -> Result<(), MachineError> {
        match self.shared.upgrade() {
            Some(shared) => shared.submit(Step::Action(action)).map(|_| ()),
            None => {
                tracing::warn!(action = %action.name(), "dispatch on a dropped machine ignored");
                Ok(())
            }
        }
    }

    /// Same as [`Machine::shortcut`]; `Ok(false)` once the machine is gone.
    pub fn shortcut(&self, state: S) -> Result<bool, MachineError> {
        match self.shared.upgrade() {
            Some(shared) => shared.submit(Step::Jump(state)),
            None => {
                tracing::warn!(to = %state.name(), "shortcut on a dropped machine ignored");
                Ok(false)
            }
        }
    }

    /// Same as [`Machine::start`]; a no-op handle once the machine is gone.
    pub fn start(&self, command: C) -> Result<StopHandle, MachineError> {
        match self.shared.upgrade() {
            Some(shared) => shared.start_command(command),
            None => {
                tracing::warn!(command = %command.name(), "start on a dropped machine ignored");
                Ok(StopHandle::noop())
            }
        }
    }

    pub fn get_state(&self) -> Option<Arc<S>> {
        self.shared.upgrade().map(|shared| shared.current_state())
    }

    /// A strong handle, if the machine still exists.
    pub fn machine(&self) -> Option<Machine<S, A, C>> {
        self.shared.upgrade().map(|shared| Machine { shared })
    }

    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    pub(crate) fn finish_command(&self, id: CommandId) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.finish_command(id))
            .unwrap_or(false)
    }
}

impl<S: State, A: Action, C: Command> Clone for Dispatcher<S, A, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<S: State, A: Action, C: Command> std::fmt::Debug for Dispatcher<S, A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("alive", &self.is_alive())
            .finish()
    }
}
