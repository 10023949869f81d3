//! Declarative per-state configuration and its lookups.

use super::Rule;
use crate::core::{Action, Command, Guard, State};
use crate::effects::{EffectFn, ReactionFn};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Why an action found no rule in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnhandledReason {
    /// The current state tag has no configuration at all.
    StateNotConfigured,
    /// The state is configured but declares no actions.
    NoActions,
    /// The state declares actions, but not this one.
    ActionNotDeclared,
    /// The action is explicitly denied in this state.
    ActionDenied,
}

impl fmt::Display for UnhandledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::StateNotConfigured => "state not configured",
            Self::NoActions => "state declares no actions",
            Self::ActionNotDeclared => "action not declared",
            Self::ActionDenied => "action denied",
        };
        f.write_str(text)
    }
}

/// Why a command or shortcut was refused by the current state's allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    /// The current state tag has no configuration at all.
    StateNotConfigured,
    /// The state is configured but has no allow-list.
    NoAllowList,
    /// The allow-list does not contain the requested tag.
    NotAllowed,
    /// No command function is registered for the tag.
    NotRegistered,
}

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::StateNotConfigured => "state not configured",
            Self::NoAllowList => "state has no allow-list",
            Self::NotAllowed => "not in the allow-list",
            Self::NotRegistered => "no command registered",
        };
        f.write_str(text)
    }
}

pub(crate) enum ActionEntry<S: State, A: Action> {
    Rule {
        guard: Option<Guard<S, A>>,
        rule: Rule<S, A>,
    },
    Denied,
}

pub(crate) struct StateEntry<S: State, A: Action, C: Command> {
    pub(crate) actions: Option<HashMap<String, ActionEntry<S, A>>>,
    pub(crate) effect: Option<EffectFn<S, A, C>>,
    pub(crate) reaction: Option<ReactionFn<S, A, C>>,
    pub(crate) commands: Option<HashSet<String>>,
    pub(crate) shortcuts: Option<HashSet<String>>,
}

pub(crate) enum Resolution<S: State, A: Action> {
    Rule {
        guard: Option<Guard<S, A>>,
        rule: Rule<S, A>,
    },
    Unhandled(UnhandledReason),
}

/// Immutable lookup table built once by the builder.
pub(crate) struct TransitionTable<S: State, A: Action, C: Command> {
    states: HashMap<String, StateEntry<S, A, C>>,
}

impl<S: State, A: Action, C: Command> TransitionTable<S, A, C> {
    pub(crate) fn new(states: HashMap<String, StateEntry<S, A, C>>) -> Self {
        Self { states }
    }

    pub(crate) fn resolve(&self, state: &str, action: &str) -> Resolution<S, A> {
        let Some(entry) = self.states.get(state) else {
            return Resolution::Unhandled(UnhandledReason::StateNotConfigured);
        };
        let Some(actions) = entry.actions.as_ref() else {
            return Resolution::Unhandled(UnhandledReason::NoActions);
        };
        match actions.get(action) {
            None => Resolution::Unhandled(UnhandledReason::ActionNotDeclared),
            Some(ActionEntry::Denied) => Resolution::Unhandled(UnhandledReason::ActionDenied),
            Some(ActionEntry::Rule { guard, rule }) => Resolution::Rule {
                guard: guard.clone(),
                rule: rule.clone(),
            },
        }
    }

    pub(crate) fn effect(&self, state: &str) -> Option<EffectFn<S, A, C>> {
        self.states.get(state).and_then(|entry| entry.effect.clone())
    }

    pub(crate) fn reaction(&self, state: &str) -> Option<ReactionFn<S, A, C>> {
        self.states.get(state).and_then(|entry| entry.reaction.clone())
    }

    pub(crate) fn command_gate(&self, state: &str, command: &str) -> Result<(), GateRejection> {
        let entry = self
            .states
            .get(state)
            .ok_or(GateRejection::StateNotConfigured)?;
        Self::gate(entry.commands.as_ref(), command)
    }

    pub(crate) fn shortcut_gate(&self, from: &str, to: &str) -> Result<(), GateRejection> {
        let entry = self
            .states
            .get(from)
            .ok_or(GateRejection::StateNotConfigured)?;
        Self::gate(entry.shortcuts.as_ref(), to)
    }

    pub(crate) fn allows_command(&self, state: &str, command: &str) -> bool {
        self.command_gate(state, command).is_ok()
    }

    fn gate(list: Option<&HashSet<String>>, tag: &str) -> Result<(), GateRejection> {
        match list {
            None => Err(GateRejection::NoAllowList),
            Some(list) if list.contains(tag) => Ok(()),
            Some(_) => Err(GateRejection::NotAllowed),
        }
    }
}
