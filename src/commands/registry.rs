//! Bookkeeping for running commands.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identifier of one started command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(Uuid);

impl CommandId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a command's cancel callback was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// Explicit `stop` on the handle or the machine.
    Stopped,
    /// The machine settled on a state whose allow-list excludes the command.
    Transition { to: String },
    /// The machine was destroyed.
    Destroyed,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Transition { to } => write!(f, "not allowed in {to}"),
            Self::Destroyed => f.write_str("machine destroyed"),
        }
    }
}

/// Callback that cancels a running command.
pub type CommandCancel = Box<dyn FnOnce(CancelReason) + Send>;

enum Status {
    /// The command function has not returned yet.
    Registering {
        cancel_pending: Option<CancelReason>,
        finished: bool,
    },
    Running(CommandCancel),
}

struct Entry {
    id: CommandId,
    tag: String,
    status: Status,
}

/// How registration of a command ended.
pub(crate) enum Completion {
    /// Tracked until stopped, finished or revoked.
    Running,
    /// No cancel callback was returned; nothing to track.
    Uncancellable,
    /// The command finished itself before its function returned.
    Finished,
    /// The command became disallowed while registering; cancel it now.
    Revoked(CommandCancel, CancelReason),
}

/// Why `stop` could not act on a known command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StopRefusal {
    /// The command function has not returned yet.
    Registering,
    /// The command returned no cancel callback; carries its tag.
    Uncancellable(String),
}

/// A cancel callback removed from the set, to be invoked outside the lock.
pub(crate) struct Revoked {
    pub(crate) tag: String,
    pub(crate) cancel: CommandCancel,
    pub(crate) reason: CancelReason,
}

impl Revoked {
    pub(crate) fn invoke(self) {
        (self.cancel)(self.reason)
    }
}

/// The commands currently known to a machine, in start order.
#[derive(Default)]
pub(crate) struct CommandSet {
    entries: Vec<Entry>,
    /// Commands that ran without a cancel callback, by id.
    uncancellable: HashMap<CommandId, String>,
}

impl CommandSet {
    pub(crate) fn begin(&mut self, tag: &str) -> CommandId {
        let id = CommandId::new();
        self.entries.push(Entry {
            id,
            tag: tag.to_string(),
            status: Status::Registering {
                cancel_pending: None,
                finished: false,
            },
        });
        id
    }

    pub(crate) fn complete(&mut self, id: CommandId, cancel: Option<CommandCancel>) -> Completion {
        let Some(index) = self.position(id) else {
            return Completion::Finished;
        };

        let (cancel_pending, finished) = match &mut self.entries[index].status {
            Status::Registering {
                cancel_pending,
                finished,
            } => (cancel_pending.take(), *finished),
            Status::Running(_) => return Completion::Running,
        };

        match (cancel, cancel_pending, finished) {
            (_, _, true) => {
                self.entries.remove(index);
                Completion::Finished
            }
            (None, _, false) => {
                let entry = self.entries.remove(index);
                self.uncancellable.insert(id, entry.tag);
                Completion::Uncancellable
            }
            (Some(cancel), Some(reason), false) => {
                self.entries.remove(index);
                Completion::Revoked(cancel, reason)
            }
            (Some(cancel), None, false) => {
                self.entries[index].status = Status::Running(cancel);
                Completion::Running
            }
        }
    }

    /// Forget a command without cancelling it.
    pub(crate) fn finish(&mut self, id: CommandId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        match &mut self.entries[index].status {
            Status::Registering { finished, .. } => *finished = true,
            Status::Running(_) => {
                self.entries.remove(index);
            }
        }
        true
    }

    /// Remove a running command so its callback can be invoked.
    ///
    /// Unknown ids are `Ok(None)`, except those of commands that returned no
    /// cancel callback.
    pub(crate) fn stop(&mut self, id: CommandId) -> Result<Option<Revoked>, StopRefusal> {
        let Some(index) = self.position(id) else {
            return match self.uncancellable.get(&id) {
                Some(tag) => Err(StopRefusal::Uncancellable(tag.clone())),
                None => Ok(None),
            };
        };
        if let Status::Registering { .. } = self.entries[index].status {
            return Err(StopRefusal::Registering);
        }
        Ok(self.take(index, CancelReason::Stopped))
    }

    /// Revoke every command `allowed` rejects.
    ///
    /// Running commands are removed and returned; commands still registering
    /// are marked and revoked when their function returns.
    pub(crate) fn revoke(&mut self, allowed: impl Fn(&str) -> bool, to: &str) -> Vec<Revoked> {
        self.revoke_where(allowed, CancelReason::Transition { to: to.to_string() })
    }

    /// Revoke everything, used when the machine is destroyed.
    pub(crate) fn revoke_all(&mut self) -> Vec<Revoked> {
        self.uncancellable.clear();
        self.revoke_where(|_| false, CancelReason::Destroyed)
    }

    fn revoke_where(&mut self, allowed: impl Fn(&str) -> bool, reason: CancelReason) -> Vec<Revoked> {
        let mut revoked = Vec::new();
        let mut index = 0;
        while index < self.entries.len() {
            if allowed(&self.entries[index].tag) {
                index += 1;
                continue;
            }
            if let Status::Registering { cancel_pending, .. } = &mut self.entries[index].status {
                cancel_pending.get_or_insert_with(|| reason.clone());
                index += 1;
                continue;
            }
            if let Some(taken) = self.take(index, reason.clone()) {
                revoked.push(taken);
            }
        }
        revoked
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: CommandId) -> bool {
        self.position(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn position(&self, id: CommandId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    fn take(&mut self, index: usize, reason: CancelReason) -> Option<Revoked> {
        let entry = self.entries.remove(index);
        match entry.status {
            Status::Running(cancel) => Some(Revoked {
                tag: entry.tag,
                cancel,
                reason,
            }),
            Status::Registering { .. } => None,
        }
    }
}
