//! Builder for constructing machines.

use crate::builder::error::{BuildError, BuildErrors};
use crate::builder::state::StateBuilder;
use crate::commands::{CommandCancel, CommandContext, CommandFn};
use crate::core::{Action, Command, NoCommand, State};
use crate::effects::{Cleanup, GlobalEffectFn, ScopedEffects};
use crate::machine::{Dispatcher, Machine, Parts};
use crate::observer::{Observer, TracingObserver};
use crate::options::MachineOptions;
use crate::transition::{ErrorActionFn, ErrorStateFn, TransitionError, TransitionTable};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<BuildError>>;

enum Initial<S: State, A: Action, C: Command> {
    Value(S),
    With(Box<dyn FnOnce(&mut ScopedEffects<S, A, C>) -> S + Send>),
}

/// Builder for constructing machines with a fluent API.
///
/// # Example
///
/// ```
/// use switchyard::{action_enum, state_enum, MachineBuilder, StateBuilder};
///
/// state_enum! {
///     enum Light {
///         Off,
///         On,
///         Broken,
///     }
///     error: [Broken]
/// }
///
/// action_enum! {
///     enum Switch {
///         Flip,
///     }
/// }
///
/// let machine = MachineBuilder::<Light, Switch>::new()
///     .initial(Light::Off)
///     .state("Off", StateBuilder::new().to("Flip", Light::On))
///     .state("On", StateBuilder::new().to("Flip", Light::Off))
///     .error_state(|_, _| Light::Broken)
///     .build()
///     .unwrap();
///
/// machine.dispatch(Switch::Flip).unwrap();
/// assert_eq!(*machine.get_state(), Light::On);
/// ```
pub struct MachineBuilder<S: State, A: Action, C: Command = NoCommand> {
    initial: Option<Initial<S, A, C>>,
    states: Vec<(String, StateBuilder<S, A, C>)>,
    commands: Vec<(String, CommandFn<S, A, C>)>,
    global_effect: Option<GlobalEffectFn<S, A, C>>,
    error_state: Option<ErrorStateFn<S>>,
    error_action: Option<ErrorActionFn<S, A>>,
    options: MachineOptions,
    observer: Option<Arc<dyn Observer>>,
}

impl<S: State, A: Action, C: Command> MachineBuilder<S, A, C> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            initial: None,
            states: Vec::new(),
            commands: Vec::new(),
            global_effect: None,
            error_state: None,
            error_action: None,
            options: MachineOptions::default(),
            observer: None,
        }
    }

    /// Set the initial state (required, or use `initial_with`).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(Initial::Value(state));
        self
    }

    /// Compute the initial state at build time, registering effects that
    /// live as long as the initial state's own activation.
    pub fn initial_with<F>(mut self, init: F) -> Self
    where
        F: FnOnce(&mut ScopedEffects<S, A, C>) -> S + Send + 'static,
    {
        self.initial = Some(Initial::With(Box::new(init)));
        self
    }

    /// Configure one state tag.
    pub fn state(mut self, tag: &str, state: StateBuilder<S, A, C>) -> Self {
        self.states.push((tag.to_string(), state));
        self
    }

    /// Register the body of a command tag.
    pub fn command<F>(mut self, tag: &str, body: F) -> Self
    where
        F: Fn(C, &CommandContext<S, A, C>) -> Option<CommandCancel> + Send + Sync + 'static,
    {
        self.commands.push((tag.to_string(), Arc::new(body)));
        self
    }

    /// Effect started at construction and torn down by `destroy`.
    pub fn global_effect<F>(mut self, effect: F) -> Self
    where
        F: FnOnce(&Dispatcher<S, A, C>) -> Option<Cleanup> + Send + 'static,
    {
        self.global_effect = Some(Box::new(effect));
        self
    }

    /// State adopted when a rule fails (required).
    pub fn error_state<F>(mut self, error_state: F) -> Self
    where
        F: Fn(&TransitionError, &S) -> S + Send + Sync + 'static,
    {
        self.error_state = Some(Arc::new(error_state));
        self
    }

    /// Action tried once in place of a failed rule before falling back to
    /// the error state.
    pub fn error_action<F>(mut self, error_action: F) -> Self
    where
        F: Fn(&TransitionError, &S) -> Option<A> + Send + Sync + 'static,
    {
        self.error_action = Some(Arc::new(error_action));
        self
    }

    /// Replace every option at once.
    pub fn options(mut self, options: MachineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    /// Label diagnostics and enable debug-level tracing.
    pub fn debug(mut self, label: impl Into<String>) -> Self {
        self.options.debug = Some(label.into());
        self
    }

    pub fn max_recursive_dispatch(mut self, limit: usize) -> Self {
        self.options.max_recursive_dispatch = limit;
        self
    }

    pub fn vetoable_cleanup(mut self, vetoable: bool) -> Self {
        self.options.vetoable_cleanup = vetoable;
        self
    }

    /// Send diagnostics somewhere other than `tracing`.
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Check the whole configuration, accumulating every problem.
    fn validate(&self) -> Check {
        let mut checks: Vec<Check> = vec![
            if self.initial.is_some() {
                Validation::success(())
            } else {
                Validation::fail(BuildError::MissingInitialState)
            },
            if self.error_state.is_some() {
                Validation::success(())
            } else {
                Validation::fail(BuildError::MissingErrorState)
            },
        ];

        checks.extend(
            duplicates(self.states.iter().map(|(tag, _)| tag.as_str()))
                .into_iter()
                .map(|tag| Validation::fail(BuildError::DuplicateState { tag })),
        );

        for (state, builder) in &self.states {
            checks.extend(builder.duplicate_actions().into_iter().map(|action| {
                Validation::fail(BuildError::DuplicateAction {
                    state: state.clone(),
                    action,
                })
            }));
        }

        checks.extend(
            duplicates(self.commands.iter().map(|(tag, _)| tag.as_str()))
                .into_iter()
                .map(|tag| Validation::fail(BuildError::DuplicateCommand { tag })),
        );

        Validation::all_vec(checks).map(|_| ())
    }

    /// Build and start the machine.
    ///
    /// Construction runs the global effect, the initial state's effect and
    /// reaction, and drains anything they dispatched.
    pub fn build(self) -> Result<Machine<S, A, C>, BuildErrors> {
        if let Validation::Failure(errors) = self.validate() {
            return Err(BuildErrors(errors.iter().cloned().collect()));
        }

        let (Some(initial), Some(error_state)) = (self.initial, self.error_state) else {
            return Err(BuildErrors(vec![BuildError::MissingInitialState]));
        };

        let mut scoped = ScopedEffects::new();
        let initial = match initial {
            Initial::Value(state) => state,
            Initial::With(init) => init(&mut scoped),
        };

        let table = TransitionTable::new(
            self.states
                .into_iter()
                .map(|(tag, builder)| (tag, builder.into_entry()))
                .collect(),
        );

        let parts = Parts {
            initial,
            scoped,
            table,
            commands: self.commands.into_iter().collect::<HashMap<_, _>>(),
            global_effect: self.global_effect,
            error_state,
            error_action: self.error_action,
            options: self.options,
            observer: self
                .observer
                .unwrap_or_else(|| Arc::new(TracingObserver)),
        };

        Machine::boot(parts).map_err(|error| BuildErrors::from(BuildError::Boot(error)))
    }
}

impl<S: State, A: Action, C: Command> Default for MachineBuilder<S, A, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, A: Action, C: Command> Machine<S, A, C> {
    /// Shorthand for [`MachineBuilder::new`].
    pub fn builder() -> MachineBuilder<S, A, C> {
        MachineBuilder::new()
    }
}

/// Tags that appear more than once, each reported once.
fn duplicates<'a>(tags: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    tags.filter(|tag| !seen.insert(*tag) && reported.insert(*tag))
        .map(str::to_string)
        .collect()
}
