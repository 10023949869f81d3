//! The dispatch loop.
//!
//! `submit` queues a step. The first caller to find the machine idle becomes
//! the drainer: it processes the queue until it is empty, settling the effect
//! and command lifecycle whenever it runs dry, and then notifies subscribers
//! once. Everyone else just leaves their step in the queue.
//!
//! The drainer keeps its role while subscribers are notified. Steps queued in
//! the meantime are drained by the same caller afterwards, so notifications
//! go out in the order the states were reached.

use super::{Shared, Step};
use crate::commands::Revoked;
use crate::core::{Action, Command, State};
use crate::effects::{Cleanup, Teardown};
use crate::error::MachineError;
use crate::observer::Diagnostic;
use crate::transition::{Resolution, Rule, TransitionError, TransitionResult};
use std::sync::Arc;
use std::thread;

/// Outcome of a whole drain.
pub(super) struct Drained<S> {
    pub(super) state: Arc<S>,
    /// Whether the first step was applied and survived settling.
    pub(super) first_applied: bool,
    /// Error that cut the drain short; `state` is then the rolled back value.
    pub(super) failure: Option<MachineError>,
}

impl<S: State, A: Action, C: Command> Shared<S, A, C> {
    /// Queue a step and drain if nobody else is draining.
    ///
    /// Returns whether the step was applied, or `true` if it was handed to the
    /// current drainer.
    pub(crate) fn submit(&self, step: Step<S, A>) -> Result<bool, MachineError> {
        let entry = {
            let mut core = self.lock();
            if core.destroyed {
                let operation = step.operation();
                drop(core);
                return self.destroyed_call(operation).map(|()| false);
            }

            let me = thread::current().id();
            if core.in_transition && core.draining == Some(me) {
                let error = MachineError::DispatchInTransition {
                    state: core.state.name().to_string(),
                    action: step.label().to_string(),
                };
                core.reentered.get_or_insert_with(|| error.clone());
                return Err(error);
            }

            core.queue.push_back(step);
            if core.draining.is_some() {
                return Ok(true);
            }
            core.draining = Some(me);
            Arc::clone(&core.state)
        };

        self.run_drains(entry)
    }

    /// Drain as the current drainer until nothing is left, notifying after
    /// each drain that moved the state.
    ///
    /// A fatal error is returned once the queue is finally empty; subscribers
    /// still hear about the value the machine was rolled back to.
    pub(super) fn run_drains(&self, mut entry: Arc<S>) -> Result<bool, MachineError> {
        let mut first_applied = None;
        let mut failure = None;
        loop {
            let drained = self.drain(&entry);
            first_applied.get_or_insert(drained.first_applied);
            if failure.is_none() {
                failure = drained.failure;
            }
            if !Arc::ptr_eq(&entry, &drained.state) {
                self.notify(&drained.state);
            }
            if self.release_drain() {
                break;
            }
            entry = drained.state;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(first_applied.unwrap_or(false)),
        }
    }

    /// Give up the drainer role, unless steps arrived during notification.
    fn release_drain(&self) -> bool {
        let mut core = self.lock();
        if core.destroyed || core.queue.is_empty() {
            core.queue.clear();
            core.draining = None;
            return true;
        }
        false
    }

    fn notify(&self, state: &Arc<S>) {
        self.observe(Diagnostic::Emitting {
            state: state.name(),
        });
        self.relay.emit(state);
    }

    /// Drain the queue. On error the machine is rolled back to the last
    /// settled state with an empty queue, and commands are reconciled against
    /// that state.
    fn drain(&self, entry: &Arc<S>) -> Drained<S> {
        let mut settled = Arc::clone(entry);
        match self.drain_rounds(&mut settled) {
            Ok(drained) => drained,
            Err(error) => {
                let rolled_back = {
                    let mut core = self.lock();
                    core.queue.clear();
                    core.in_transition = false;
                    core.reentered = None;
                    if !core.destroyed {
                        core.state = Arc::clone(&settled);
                    }
                    !core.destroyed
                };
                if rolled_back {
                    self.reconcile_commands(settled.name());
                }
                Drained {
                    state: settled,
                    first_applied: false,
                    failure: Some(error),
                }
            }
        }
    }

    fn drain_rounds(&self, settled: &mut Arc<S>) -> Result<Drained<S>, MachineError> {
        let limit = self.options.max_recursive_dispatch;
        let budget = limit.saturating_add(1);
        let mut processed = 0usize;
        let mut rounds = 0usize;
        let mut first_applied = None;

        loop {
            let mut forced = false;
            while let Some(step) = self.next_step() {
                processed += 1;
                if processed > budget {
                    return Err(MachineError::MaxRecursiveDispatchReached { limit });
                }
                let applied = self.apply(step, &mut forced)?;
                first_applied.get_or_insert(applied);
            }
            rounds += 1;

            let current = self.current_state();
            if !Arc::ptr_eq(&current, settled) {
                if self.settle(settled, &current, forced) {
                    *settled = current;
                } else if rounds == 1 {
                    first_applied = Some(false);
                }
            }

            let mut core = self.lock();
            if core.destroyed || core.queue.is_empty() {
                core.queue.clear();
                return Ok(Drained {
                    state: Arc::clone(&core.state),
                    first_applied: first_applied.unwrap_or(false),
                    failure: None,
                });
            }
            if rounds > budget {
                let remaining = core.queue.len();
                drop(core);
                return Err(MachineError::UnexpectedDispatchQueue { remaining });
            }
        }
    }

    fn next_step(&self) -> Option<Step<S, A>> {
        let mut core = self.lock();
        if core.destroyed {
            return None;
        }
        core.queue.pop_front()
    }

    /// Apply one step; returns whether a new state value was adopted.
    fn apply(&self, step: Step<S, A>, forced: &mut bool) -> Result<bool, MachineError> {
        match step {
            Step::Action(action) => self.apply_action(&action, forced),
            Step::Jump(target) => self.apply_jump(target, forced),
        }
    }

    fn apply_action(&self, action: &A, forced: &mut bool) -> Result<bool, MachineError> {
        let current = self.current_state();
        let (guard, rule) = match self.table.resolve(current.name(), action.name()) {
            Resolution::Rule { guard, rule } => (guard, rule),
            Resolution::Unhandled(reason) => {
                if self.options.strict {
                    return Err(MachineError::UnhandledAction {
                        state: current.name().to_string(),
                        action: action.name().to_string(),
                        reason,
                    });
                }
                self.observe(Diagnostic::Unhandled {
                    state: current.name(),
                    action: action.name(),
                    reason,
                });
                return Ok(false);
            }
        };

        if let Some(guard) = guard {
            if !guard.check(&current, action) {
                self.observe(Diagnostic::Cancelled {
                    state: current.name(),
                    action: action.name(),
                });
                return Ok(false);
            }
        }

        match self.run_rule(&rule, &current, action)? {
            Ok(result) => self.adopt(&current, action.name(), result, forced),
            Err(error) => self.recover(&current, action, error, forced),
        }
    }

    /// Run a rule with the reentrancy check armed.
    fn run_rule(
        &self,
        rule: &Rule<S, A>,
        state: &Arc<S>,
        action: &A,
    ) -> Result<Result<TransitionResult<S>, TransitionError>, MachineError> {
        self.lock().in_transition = true;
        let outcome = rule(state.as_ref(), action);
        let mut core = self.lock();
        core.in_transition = false;
        match core.reentered.take() {
            Some(error) => Err(error),
            None => Ok(outcome),
        }
    }

    /// Route a failed rule through the error action, else the error state.
    ///
    /// The error state is adopted like any other target, reaction included.
    fn recover(
        &self,
        current: &Arc<S>,
        action: &A,
        error: TransitionError,
        forced: &mut bool,
    ) -> Result<bool, MachineError> {
        self.observe(Diagnostic::TransitionFailed {
            state: current.name(),
            action: action.name(),
            error: &error,
        });

        let fallback = self
            .error_action
            .as_ref()
            .and_then(|pick| pick(&error, current.as_ref()));
        if let Some(fallback) = fallback {
            if let Resolution::Rule { guard, rule } =
                self.table.resolve(current.name(), fallback.name())
            {
                let passes = guard.map_or(true, |guard| guard.check(current, &fallback));
                if passes {
                    if let Ok(result) = self.run_rule(&rule, current, &fallback)? {
                        return self.adopt(current, fallback.name(), result, forced);
                    }
                }
            }
        }

        let next = (self.error_state)(&error, current.as_ref());
        self.adopt(current, action.name(), TransitionResult::Changed(next), forced)
    }

    fn apply_jump(&self, target: S, forced: &mut bool) -> Result<bool, MachineError> {
        let current = self.current_state();
        if let Err(reason) = self.table.shortcut_gate(current.name(), target.name()) {
            if self.options.strict {
                return Err(MachineError::UnhandledShortcut {
                    from: current.name().to_string(),
                    to: target.name().to_string(),
                    reason,
                });
            }
            self.observe(Diagnostic::ShortcutRejected {
                from: current.name(),
                to: target.name(),
                reason,
            });
            return Ok(false);
        }
        self.adopt(&current, "shortcut", TransitionResult::Changed(target), forced)
    }

    /// Apply a rule's result: store the new value and run its reaction.
    fn adopt(
        &self,
        current: &Arc<S>,
        label: &str,
        result: TransitionResult<S>,
        forced: &mut bool,
    ) -> Result<bool, MachineError> {
        let rerun = result.is_forced();
        let next = match result {
            TransitionResult::Changed(next) | TransitionResult::Rerun(next) => Arc::new(next),
            TransitionResult::Unchanged => {
                self.observe(Diagnostic::SameState {
                    state: current.name(),
                    action: label,
                });
                return Ok(false);
            }
            TransitionResult::Cancelled => {
                self.observe(Diagnostic::Cancelled {
                    state: current.name(),
                    action: label,
                });
                return Ok(false);
            }
        };

        if !self.store(current, Arc::clone(&next), label) {
            return Ok(false);
        }
        *forced |= rerun;
        if let Some(reaction) = self.table.reaction(next.name()) {
            reaction(&self.context(&next));
        }
        Ok(true)
    }

    /// Make `next` the current value unless the machine was destroyed.
    fn store(&self, current: &Arc<S>, next: Arc<S>, label: &str) -> bool {
        {
            let mut core = self.lock();
            if core.destroyed {
                return false;
            }
            core.state = Arc::clone(&next);
        }
        self.observe(Diagnostic::Transitioned {
            from: current.name(),
            to: next.name(),
            action: label,
        });
        true
    }

    /// Run the effect and command lifecycle for a value the queue settled on.
    ///
    /// Returns `false` if a cleanup vetoed and the machine reverted to
    /// `settled`.
    fn settle(&self, settled: &Arc<S>, current: &Arc<S>, forced: bool) -> bool {
        if current.name() == settled.name() && !forced {
            return true;
        }
        if self.is_destroyed() {
            return true;
        }

        let active = self.lock().effect.take();
        if let Some(mut cleanup) = active {
            if cleanup.run() == Teardown::Veto {
                let honored = self.options.vetoable_cleanup;
                self.observe(Diagnostic::CleanupVetoed {
                    state: settled.name(),
                    honored,
                });
                if honored {
                    let reverted = {
                        let mut core = self.lock();
                        core.effect.restore(cleanup);
                        if !core.destroyed {
                            core.state = Arc::clone(settled);
                        }
                        !core.destroyed
                    };
                    if reverted {
                        self.reconcile_commands(settled.name());
                    }
                    return false;
                }
            }
        }

        self.reconcile_commands(current.name());
        self.start_effect(current);
        true
    }

    fn reconcile_commands(&self, tag: &str) {
        let revoked = self
            .lock()
            .running
            .revoke(|command| self.table.allows_command(tag, command), tag);
        self.cancel_all(revoked);
    }

    pub(super) fn cancel_all(&self, revoked: Vec<Revoked>) {
        for revoked in revoked {
            self.observe(Diagnostic::CommandCancelled {
                command: &revoked.tag,
                reason: &revoked.reason,
            });
            revoked.invoke();
        }
    }

    pub(super) fn start_effect(&self, state: &Arc<S>) {
        let Some(effect) = self.table.effect(state.name()) else {
            return;
        };
        self.observe(Diagnostic::EffectStarted {
            state: state.name(),
        });
        let cleanup = effect(&self.context(state));
        self.install_effect(cleanup);
    }

    /// Keep `cleanup` as the active activation, or run it right away if the
    /// machine was destroyed while the effect was starting.
    pub(super) fn install_effect(&self, cleanup: Option<Cleanup>) {
        let leftover = {
            let mut core = self.lock();
            if core.destroyed {
                cleanup
            } else {
                core.effect.install(cleanup);
                None
            }
        };
        if let Some(mut cleanup) = leftover {
            cleanup.run();
        }
    }
}
