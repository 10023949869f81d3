//! Builder for the configuration of one state tag.

use crate::core::{Action, Command, Guard, NoCommand, State};
use crate::effects::{Cleanup, EffectContext, EffectFn, ReactionFn};
use crate::transition::{ActionEntry, StateEntry, TransitionError, TransitionResult};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Declares what one state tag accepts and what runs while it is current.
///
/// A state that never calls [`on`](Self::on), [`to`](Self::to) or
/// [`deny`](Self::deny) has no action table at all, which is reported
/// differently from an action that is simply missing.
pub struct StateBuilder<S: State, A: Action, C: Command = NoCommand> {
    actions: Option<Vec<(String, ActionEntry<S, A>)>>,
    effect: Option<EffectFn<S, A, C>>,
    reaction: Option<ReactionFn<S, A, C>>,
    commands: Option<HashSet<String>>,
    shortcuts: Option<HashSet<String>>,
}

impl<S: State, A: Action, C: Command> StateBuilder<S, A, C> {
    pub fn new() -> Self {
        Self {
            actions: None,
            effect: None,
            reaction: None,
            commands: None,
            shortcuts: None,
        }
    }

    /// Handle `action` with `rule`.
    pub fn on<F>(self, action: &str, rule: F) -> Self
    where
        F: Fn(&S, &A) -> Result<TransitionResult<S>, TransitionError> + Send + Sync + 'static,
    {
        self.push(
            action,
            ActionEntry::Rule {
                guard: None,
                rule: Arc::new(rule),
            },
        )
    }

    /// Handle `action` with `rule` only when `guard` passes; otherwise the
    /// action is ignored.
    pub fn on_guarded<F>(self, action: &str, guard: Guard<S, A>, rule: F) -> Self
    where
        F: Fn(&S, &A) -> Result<TransitionResult<S>, TransitionError> + Send + Sync + 'static,
    {
        self.push(
            action,
            ActionEntry::Rule {
                guard: Some(guard),
                rule: Arc::new(rule),
            },
        )
    }

    /// Move to a fixed `target` on `action`.
    pub fn to(self, action: &str, target: S) -> Self {
        self.on(action, move |_, _| Ok(TransitionResult::Changed(target.clone())))
    }

    /// Explicitly refuse `action` in this state.
    pub fn deny(self, action: &str) -> Self {
        self.push(action, ActionEntry::Denied)
    }

    /// Effect started when the machine settles on this tag.
    pub fn effect<F>(mut self, effect: F) -> Self
    where
        F: Fn(&EffectContext<S, A, C>) -> Option<Cleanup> + Send + Sync + 'static,
    {
        self.effect = Some(Arc::new(effect));
        self
    }

    /// Reaction run every time a value with this tag is adopted.
    pub fn reaction<F>(mut self, reaction: F) -> Self
    where
        F: Fn(&EffectContext<S, A, C>) + Send + Sync + 'static,
    {
        self.reaction = Some(Arc::new(reaction));
        self
    }

    /// Command tags allowed to run in this state.
    pub fn commands<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.commands
            .get_or_insert_with(HashSet::new)
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// State tags reachable from here through `shortcut`.
    pub fn shortcuts<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.shortcuts
            .get_or_insert_with(HashSet::new)
            .extend(tags.into_iter().map(Into::into));
        self
    }

    fn push(mut self, action: &str, entry: ActionEntry<S, A>) -> Self {
        self.actions
            .get_or_insert_with(Vec::new)
            .push((action.to_string(), entry));
        self
    }

    /// Action tags declared more than once.
    pub(crate) fn duplicate_actions(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for (action, _) in self.actions.iter().flatten() {
            if !seen.insert(action.as_str()) && !duplicates.contains(action) {
                duplicates.push(action.clone());
            }
        }
        duplicates
    }

    pub(crate) fn into_entry(self) -> StateEntry<S, A, C> {
        StateEntry {
            actions: self
                .actions
                .map(|actions| actions.into_iter().collect::<HashMap<_, _>>()),
            effect: self.effect,
            reaction: self.reaction,
            commands: self.commands,
            shortcuts: self.shortcuts,
        }
    }
}

impl<S: State, A: Action, C: Command> Default for StateBuilder<S, A, C> {
    fn default() -> Self {
        Self::new()
    }
}
