//! State-gated background commands.
//!
//! A command is started explicitly with `start(command)`. It only runs if the
//! current state lists its tag and a command function is registered for it.
//! The function may hand back a cancel callback; the machine then tracks the
//! command until it is stopped, finishes itself, or a transition settles on a
//! state that no longer allows it.

mod handle;
mod registry;

pub use handle::{CommandContext, CommandFn, StopHandle};
pub use registry::{CancelReason, CommandCancel, CommandId};

pub(crate) use handle::Stopper;
pub(crate) use registry::{CommandSet, Completion, Revoked, StopRefusal};
