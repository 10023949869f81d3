//! Handles given to command callers and command bodies.

use super::{CommandCancel, CommandId};
use crate::core::{Action, Command, State};
use crate::error::MachineError;
use crate::machine::Dispatcher;
use std::sync::{Arc, Weak};

/// The machine side of [`StopHandle::stop`].
pub(crate) trait Stopper: Send + Sync {
    fn stop_command(&self, id: CommandId) -> Result<bool, MachineError>;
}

#[derive(Clone)]
enum HandleKind {
    /// The command was rejected and never ran.
    Noop,
    Tracked {
        id: CommandId,
        stopper: Weak<dyn Stopper>,
    },
    /// The command returned no cancel callback.
    Uncancellable { id: CommandId, tag: String },
}

/// Returned by `start`; stops the command it refers to.
#[derive(Clone)]
pub struct StopHandle {
    kind: HandleKind,
}

impl StopHandle {
    pub(crate) fn noop() -> Self {
        Self {
            kind: HandleKind::Noop,
        }
    }

    pub(crate) fn tracked(id: CommandId, stopper: Weak<dyn Stopper>) -> Self {
        Self {
            kind: HandleKind::Tracked { id, stopper },
        }
    }

    pub(crate) fn uncancellable(id: CommandId, tag: &str) -> Self {
        Self {
            kind: HandleKind::Uncancellable {
                id,
                tag: tag.to_string(),
            },
        }
    }

    /// Stop the command.
    ///
    /// Returns `Ok(true)` if this call cancelled it and `Ok(false)` if it had
    /// already stopped, finished or been cancelled by a transition.
    pub fn stop(&self) -> Result<bool, MachineError> {
        match &self.kind {
            HandleKind::Noop => Ok(false),
            HandleKind::Tracked { id, stopper } => match stopper.upgrade() {
                Some(stopper) => stopper.stop_command(*id),
                None => Ok(false),
            },
            HandleKind::Uncancellable { tag, .. } => Err(MachineError::CommandNotCancellable {
                command: tag.clone(),
            }),
        }
    }

    /// Identifier of the started command, `None` if it was rejected.
    pub fn id(&self) -> Option<CommandId> {
        match &self.kind {
            HandleKind::Noop => None,
            HandleKind::Tracked { id, .. } | HandleKind::Uncancellable { id, .. } => Some(*id),
        }
    }

    /// Whether the command was rejected and never ran.
    pub fn is_noop(&self) -> bool {
        matches!(self.kind, HandleKind::Noop)
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            HandleKind::Noop => f.write_str("StopHandle(noop)"),
            HandleKind::Tracked { id, .. } => write!(f, "StopHandle({id})"),
            HandleKind::Uncancellable { id, tag } => {
                write!(f, "StopHandle({id}, {tag}, uncancellable)")
            }
        }
    }
}

/// What a command body gets to work with.
///
/// Cheap to clone; move it into a spawned task to dispatch results later.
pub struct CommandContext<S: State, A: Action, C: Command> {
    id: CommandId,
    tag: String,
    dispatcher: Dispatcher<S, A, C>,
}

impl<S: State, A: Action, C: Command> CommandContext<S, A, C> {
    pub(crate) fn new(id: CommandId, tag: &str, dispatcher: Dispatcher<S, A, C>) -> Self {
        Self {
            id,
            tag: tag.to_string(),
            dispatcher,
        }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Mark the command as done without invoking its cancel callback.
    ///
    /// Returns `false` if it had already stopped or been cancelled.
    pub fn finish(&self) -> bool {
        self.dispatcher.finish_command(self.id)
    }

    pub fn dispatch(&self, action: A) -> Result<(), MachineError> {
        self.dispatcher.dispatch(action)
    }

    /// Current state of the machine, `None` once it is gone.
    pub fn get_state(&self) -> Option<Arc<S>> {
        self.dispatcher.get_state()
    }

    pub fn dispatcher(&self) -> &Dispatcher<S, A, C> {
        &self.dispatcher
    }
}

impl<S: State, A: Action, C: Command> Clone for CommandContext<S, A, C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tag: self.tag.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

/// Body of a command: starts the work and optionally returns a way to cancel it.
pub type CommandFn<S, A, C> =
    Arc<dyn Fn(C, &CommandContext<S, A, C>) -> Option<CommandCancel> + Send + Sync>;
