//! What an effect or reaction sees when it runs.

use super::Cleanup;
use crate::core::{Action, Command, NoCommand, State};
use crate::error::MachineError;
use crate::machine::Dispatcher;
use std::sync::Arc;

/// Context handed to effects and reactions.
///
/// Carries the state value that was entered and a [`Dispatcher`] that can
/// outlive the call, so asynchronous work started by the effect can report
/// back later.
pub struct EffectContext<S: State, A: Action, C: Command = NoCommand> {
    state: Arc<S>,
    dispatcher: Dispatcher<S, A, C>,
}

impl<S: State, A: Action, C: Command> EffectContext<S, A, C> {
    pub(crate) fn new(state: Arc<S>, dispatcher: Dispatcher<S, A, C>) -> Self {
        Self { state, dispatcher }
    }

    /// The state value this effect was started for.
    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_arc(&self) -> &Arc<S> {
        &self.state
    }

    pub fn dispatcher(&self) -> &Dispatcher<S, A, C> {
        &self.dispatcher
    }

    /// Queue an action on the machine.
    pub fn dispatch(&self, action: A) -> Result<(), MachineError> {
        self.dispatcher.dispatch(action)
    }
}

/// Per-state effect: started on entry, torn down through the returned cleanup.
pub type EffectFn<S, A, C> =
    Arc<dyn Fn(&EffectContext<S, A, C>) -> Option<Cleanup> + Send + Sync>;

/// Runs each time a new state value is adopted, before subscribers hear of it.
pub type ReactionFn<S, A, C> = Arc<dyn Fn(&EffectContext<S, A, C>) + Send + Sync>;

/// Machine-wide effect: started at construction, torn down at destroy.
pub type GlobalEffectFn<S, A, C> =
    Box<dyn FnOnce(&Dispatcher<S, A, C>) -> Option<Cleanup> + Send>;

type ScopedEffectFn<S, A, C> = Box<dyn FnOnce(&EffectContext<S, A, C>) -> Option<Cleanup> + Send>;

/// Effects registered while computing the initial state.
///
/// They start together with the initial state's own effect and share its
/// activation, so they are torn down on the first tag change.
pub struct ScopedEffects<S: State, A: Action, C: Command> {
    effects: Vec<ScopedEffectFn<S, A, C>>,
}

impl<S: State, A: Action, C: Command> ScopedEffects<S, A, C> {
    pub(crate) fn new() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    /// Register an effect scoped to the initial state.
    pub fn effect<F>(&mut self, effect: F) -> &mut Self
    where
        F: FnOnce(&EffectContext<S, A, C>) -> Option<Cleanup> + Send + 'static,
    {
        self.effects.push(Box::new(effect));
        self
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Start every registered effect, collecting their cleanups.
    pub(crate) fn start(self, context: &EffectContext<S, A, C>) -> Vec<Cleanup> {
        self.effects
            .into_iter()
            .filter_map(|effect| effect(context))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NoCommand;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
    enum Lamp {
        On,
    }

    impl State for Lamp {
        fn name(&self) -> &str {
            "On"
        }
    }

    #[derive(Clone, Debug)]
    struct Toggle;

    impl Action for Toggle {
        fn name(&self) -> &str {
            "Toggle"
        }
    }

    #[test]
    fn scoped_effects_start_in_registration_order() {
        let started = Arc::new(AtomicUsize::new(0));
        let mut scoped = ScopedEffects::<Lamp, Toggle, NoCommand>::new();
        assert!(scoped.is_empty());

        let first = Arc::clone(&started);
        let second = Arc::clone(&started);
        scoped
            .effect(move |_| {
                assert_eq!(first.fetch_add(1, Ordering::SeqCst), 0);
                Some(Cleanup::new(|| {}))
            })
            .effect(move |ctx| {
                assert_eq!(ctx.state(), &Lamp::On);
                assert_eq!(second.fetch_add(1, Ordering::SeqCst), 1);
                None
            });
        assert_eq!(scoped.len(), 2);

        let context = EffectContext::new(Arc::new(Lamp::On), Dispatcher::detached());
        let cleanups = scoped.start(&context);

        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(cleanups.len(), 1);
    }

    #[test]
    fn detached_context_dispatch_is_a_noop() {
        let context =
            EffectContext::<Lamp, Toggle, NoCommand>::new(Arc::new(Lamp::On), Dispatcher::detached());
        assert_eq!(context.dispatch(Toggle), Ok(()));
    }
}
