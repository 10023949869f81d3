//! Starting and stopping commands.

use super::Shared;
use crate::commands::{CommandContext, CommandId, Completion, StopHandle, StopRefusal, Stopper};
use crate::core::{Action, Command, State};
use crate::error::MachineError;
use crate::observer::Diagnostic;
use crate::transition::GateRejection;
use std::sync::{Arc, Weak};

impl<S: State, A: Action, C: Command> Shared<S, A, C> {
    pub(crate) fn start_command(&self, command: C) -> Result<StopHandle, MachineError> {
        let tag = command.name().to_string();
        let (id, body) = {
            let mut core = self.lock();
            if core.destroyed {
                drop(core);
                self.destroyed_call("start")?;
                return Ok(StopHandle::noop());
            }
            let state = Arc::clone(&core.state);
            let gate = self
                .table
                .command_gate(state.name(), &tag)
                .and_then(|()| {
                    self.commands
                        .get(&tag)
                        .cloned()
                        .ok_or(GateRejection::NotRegistered)
                });
            match gate {
                Ok(body) => (core.running.begin(&tag), body),
                Err(reason) => {
                    drop(core);
                    return self.reject_command(&state, &tag, reason);
                }
            }
        };

        let context = CommandContext::new(id, &tag, self.dispatcher());
        let cancel = body(command, &context);

        let completion = self.lock().running.complete(id, cancel);
        match completion {
            Completion::Running | Completion::Finished => Ok(StopHandle::tracked(id, self.stopper())),
            Completion::Uncancellable => Ok(StopHandle::uncancellable(id, &tag)),
            Completion::Revoked(cancel, reason) => {
                self.observe(Diagnostic::CommandCancelled {
                    command: &tag,
                    reason: &reason,
                });
                cancel(reason);
                Ok(StopHandle::tracked(id, self.stopper()))
            }
        }
    }

    fn reject_command(
        &self,
        state: &S,
        tag: &str,
        reason: GateRejection,
    ) -> Result<StopHandle, MachineError> {
        if self.options.strict {
            return Err(MachineError::UnhandledCommand {
                state: state.name().to_string(),
                command: tag.to_string(),
                reason,
            });
        }
        self.observe(Diagnostic::CommandRejected {
            state: state.name(),
            command: tag,
            reason,
        });
        Ok(StopHandle::noop())
    }

    pub(crate) fn stop_running(&self, id: CommandId) -> Result<bool, MachineError> {
        let stopped = self.lock().running.stop(id);
        match stopped {
            Err(StopRefusal::Registering) => Err(MachineError::StopBeforeRegistered { id }),
            Err(StopRefusal::Uncancellable(command)) => {
                Err(MachineError::CommandNotCancellable { command })
            }
            Ok(None) => Ok(false),
            Ok(Some(revoked)) => {
                self.cancel_all(vec![revoked]);
                Ok(true)
            }
        }
    }

    pub(crate) fn finish_command(&self, id: CommandId) -> bool {
        self.lock().running.finish(id)
    }

    fn stopper(&self) -> Weak<dyn Stopper> {
        self.this.clone()
    }
}

impl<S: State, A: Action, C: Command> Stopper for Shared<S, A, C> {
    fn stop_command(&self, id: CommandId) -> Result<bool, MachineError> {
        self.stop_running(id)
    }
}
