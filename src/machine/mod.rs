//! The machine runtime.
//!
//! A [`Machine`] is a cheap, cloneable handle to a shared core guarded by a
//! mutex. The lock is only held for bookkeeping: rules, guards, effects,
//! reactions, command bodies, cleanups, observers and subscribers all run
//! with it released, so any of them may call back into the machine.
//!
//! Calls that arrive while a dispatch is being drained are queued and handled
//! by the draining caller in FIFO order. Subscribers hear about the result
//! once, after the whole queue is drained.

mod command;
mod dispatch;
mod handle;
mod lifecycle;

pub use handle::Dispatcher;
pub(crate) use lifecycle::Parts;

use crate::commands::{CommandFn, CommandId, CommandSet, StopHandle};
use crate::core::{Action, Command, NoCommand, State};
use crate::effects::{EffectContext, EffectSlot};
use crate::error::MachineError;
use crate::observer::{Diagnostic, Observer};
use crate::options::MachineOptions;
use crate::relay::{Relay, Subscription};
use crate::transition::{ErrorActionFn, ErrorStateFn, Resolution, TransitionTable};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::ThreadId;

/// One unit of queued work.
pub(crate) enum Step<S, A> {
    Action(A),
    /// Direct jump requested through `shortcut`.
    Jump(S),
}

impl<S: State, A: Action> Step<S, A> {
    fn label(&self) -> &str {
        match self {
            Self::Action(action) => action.name(),
            Self::Jump(_) => "shortcut",
        }
    }

    fn operation(&self) -> &'static str {
        match self {
            Self::Action(_) => "dispatch",
            Self::Jump(_) => "shortcut",
        }
    }
}

/// Mutable part of a machine, only touched with the lock held.
pub(crate) struct Core<S, A> {
    state: Arc<S>,
    queue: VecDeque<Step<S, A>>,
    /// Thread currently draining the queue.
    draining: Option<ThreadId>,
    /// A rule is running on the draining thread.
    in_transition: bool,
    /// Set when that rule tried to dispatch.
    reentered: Option<MachineError>,
    destroyed: bool,
    effect: EffectSlot,
    global_effect: EffectSlot,
    running: CommandSet,
}

pub(crate) struct Shared<S: State, A: Action, C: Command> {
    core: Mutex<Core<S, A>>,
    table: TransitionTable<S, A, C>,
    commands: HashMap<String, CommandFn<S, A, C>>,
    error_state: ErrorStateFn<S>,
    error_action: Option<ErrorActionFn<S, A>>,
    options: MachineOptions,
    observer: Arc<dyn Observer>,
    relay: Arc<Relay<S>>,
    this: Weak<Self>,
}

impl<S: State, A: Action, C: Command> Shared<S, A, C> {
    fn lock(&self) -> MutexGuard<'_, Core<S, A>> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observe(&self, diagnostic: Diagnostic<'_>) {
        self.observer
            .observe(self.options.debug.as_deref(), &diagnostic);
    }

    fn current_state(&self) -> Arc<S> {
        Arc::clone(&self.lock().state)
    }

    fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    fn dispatcher(&self) -> Dispatcher<S, A, C> {
        Dispatcher::new(self.this.clone())
    }

    fn context(&self, state: &Arc<S>) -> EffectContext<S, A, C> {
        EffectContext::new(Arc::clone(state), self.dispatcher())
    }

    /// Policy for calls on a destroyed machine.
    fn destroyed_call(&self, operation: &'static str) -> Result<(), MachineError> {
        if self.options.strict {
            return Err(MachineError::Destroyed { operation });
        }
        self.observe(Diagnostic::DestroyedCall { operation });
        Ok(())
    }

    fn allowed(&self, action: &A) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let state = self.current_state();
        match self.table.resolve(state.name(), action.name()) {
            Resolution::Rule { guard, .. } => guard.map_or(true, |guard| guard.check(&state, action)),
            Resolution::Unhandled(_) => false,
        }
    }
}

/// A running state machine.
///
/// Cloning the handle shares the machine. Dropping the last handle tears it
/// down like [`Machine::destroy`].
pub struct Machine<S: State, A: Action, C: Command = NoCommand> {
    shared: Arc<Shared<S, A, C>>,
}

impl<S: State, A: Action, C: Command> Clone for Machine<S, A, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: State, A: Action, C: Command> Machine<S, A, C> {
    /// The current state value.
    ///
    /// While a dispatch is being drained this is the value the drain has
    /// reached so far.
    pub fn get_state(&self) -> Arc<S> {
        self.shared.current_state()
    }

    /// Listen for settled state changes.
    pub fn subscribe<F>(&self, listener: F) -> Result<Subscription, MachineError>
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        self.register(Arc::new(listener), None)
    }

    /// Like [`Machine::subscribe`], with a hook run when the listener is
    /// removed, either explicitly or by `destroy`.
    pub fn subscribe_with<F, U>(
        &self,
        listener: F,
        on_unsubscribed: U,
    ) -> Result<Subscription, MachineError>
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
        U: FnOnce() + Send + 'static,
    {
        self.register(Arc::new(listener), Some(Box::new(on_unsubscribed)))
    }

    /// Call `listener` with the current state now, then on every change.
    pub fn watch<F>(&self, listener: F) -> Result<Subscription, MachineError>
    where
        F: Fn(&Arc<S>) + Send + Sync + 'static,
    {
        let listener: Arc<dyn Fn(&Arc<S>) + Send + Sync> = Arc::new(listener);
        let subscription = self.register(Arc::clone(&listener), None)?;
        if !self.is_destroyed() {
            listener(&self.get_state());
        }
        Ok(subscription)
    }

    fn register(
        &self,
        listener: Arc<dyn Fn(&Arc<S>) + Send + Sync>,
        on_unsubscribed: Option<Box<dyn FnOnce() + Send>>,
    ) -> Result<Subscription, MachineError> {
        match self.shared.relay.subscribe(listener, on_unsubscribed) {
            Some(subscription) => Ok(subscription),
            None => {
                self.shared.destroyed_call("subscribe")?;
                Ok(Subscription::detached())
            }
        }
    }

    /// Feed an action to the machine.
    ///
    /// Returns once the action and everything it caused has been processed,
    /// unless the machine was already busy draining, in which case the action
    /// is queued for the current drain.
    pub fn dispatch(&self, action: A) -> Result<(), MachineError> {
        self.shared.submit(Step::Action(action)).map(|_| ())
    }

    /// Whether `action` has a rule in the current state whose guard passes.
    pub fn allowed(&self, action: &A) -> bool {
        self.shared.allowed(action)
    }

    /// Whether the current state's tag is one of `tags`.
    pub fn is_state(&self, tags: &[&str]) -> bool {
        let state = self.get_state();
        tags.contains(&state.name())
    }

    /// Start a command allowed in the current state.
    pub fn start(&self, command: C) -> Result<StopHandle, MachineError> {
        self.shared.start_command(command)
    }

    /// Stop a running command by id.
    ///
    /// Behaves like [`StopHandle::stop`]: a command that returned no cancel
    /// callback is `Err(CommandNotCancellable)`, an unknown or already
    /// stopped one is `Ok(false)`.
    pub fn stop(&self, id: CommandId) -> Result<bool, MachineError> {
        if self.is_destroyed() {
            self.shared.destroyed_call("stop")?;
            return Ok(false);
        }
        self.shared.stop_running(id)
    }

    /// Number of commands currently tracked.
    pub fn running_commands(&self) -> usize {
        self.shared.lock().running.len()
    }

    /// Jump straight to `state`, bypassing the rules.
    ///
    /// The jump must be listed in the current state's shortcuts. Returns
    /// whether it was applied; a vetoed cleanup or a rejection yield
    /// `Ok(false)`. Called while the machine is draining, the jump is queued
    /// and `Ok(true)` only means it was accepted.
    pub fn shortcut(&self, state: S) -> Result<bool, MachineError> {
        self.shared.submit(Step::Jump(state))
    }

    /// Tear the machine down: cancel commands, run cleanups and drop every
    /// subscriber. Later calls only warn, or fail in strict mode.
    pub fn destroy(&self) -> Result<(), MachineError> {
        self.shared.destroy()
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.is_destroyed()
    }

    /// A weak handle for effects, commands and background tasks.
    pub fn dispatcher(&self) -> Dispatcher<S, A, C> {
        self.shared.dispatcher()
    }

    pub fn options(&self) -> &MachineOptions {
        &self.shared.options
    }
}

impl<S: State, A: Action, C: Command> std::fmt::Debug for Machine<S, A, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.shared.lock();
        f.debug_struct("Machine")
            .field("state", &core.state)
            .field("destroyed", &core.destroyed)
            .field("effect_active", &core.effect.is_active())
            .field("running_commands", &core.running.len())
            .finish()
    }
}
