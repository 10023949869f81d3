//! Construction and destruction of a machine.

use super::{Core, Machine, Shared};
use crate::commands::{CommandFn, CommandSet};
use crate::core::{Action, Command, State};
use crate::effects::{Cleanup, EffectSlot, GlobalEffectFn, ScopedEffects, Teardown};
use crate::error::{EffectScope, MachineError};
use crate::observer::{Diagnostic, Observer};
use crate::options::MachineOptions;
use crate::relay::Relay;
use crate::transition::{ErrorActionFn, ErrorStateFn, TransitionTable};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;

/// Everything the builder hands over to start a machine.
pub(crate) struct Parts<S: State, A: Action, C: Command> {
    pub(crate) initial: S,
    pub(crate) scoped: ScopedEffects<S, A, C>,
    pub(crate) table: TransitionTable<S, A, C>,
    pub(crate) commands: HashMap<String, CommandFn<S, A, C>>,
    pub(crate) global_effect: Option<GlobalEffectFn<S, A, C>>,
    pub(crate) error_state: ErrorStateFn<S>,
    pub(crate) error_action: Option<ErrorActionFn<S, A>>,
    pub(crate) options: MachineOptions,
    pub(crate) observer: Arc<dyn Observer>,
}

impl<S: State, A: Action, C: Command> Machine<S, A, C> {
    /// Create the machine and run its startup sequence: the global effect,
    /// the initial state's effect together with the scoped effects, the
    /// initial reaction, then whatever those dispatched.
    pub(crate) fn boot(parts: Parts<S, A, C>) -> Result<Self, MachineError> {
        let Parts {
            initial,
            scoped,
            table,
            commands,
            global_effect,
            error_state,
            error_action,
            options,
            observer,
        } = parts;

        let shared = Arc::new_cyclic(|this| Shared {
            core: Mutex::new(Core {
                state: Arc::new(initial),
                queue: VecDeque::new(),
                draining: Some(thread::current().id()),
                in_transition: false,
                reentered: None,
                destroyed: false,
                effect: EffectSlot::default(),
                global_effect: EffectSlot::default(),
                running: CommandSet::default(),
            }),
            table,
            commands,
            error_state,
            error_action,
            options,
            observer,
            relay: Arc::new(Relay::new()),
            this: this.clone(),
        });

        let entry = shared.current_state();
        if let Some(global_effect) = global_effect {
            let cleanup = global_effect(&shared.dispatcher());
            let leftover = {
                let mut core = shared.lock();
                if core.destroyed {
                    cleanup
                } else {
                    core.global_effect.install(cleanup);
                    None
                }
            };
            if let Some(mut cleanup) = leftover {
                cleanup.run();
            }
        }

        let context = shared.context(&entry);
        let mut cleanups = Vec::new();
        if let Some(effect) = shared.table.effect(entry.name()) {
            shared.observe(Diagnostic::EffectStarted {
                state: entry.name(),
            });
            cleanups.extend(effect(&context));
        }
        cleanups.extend(scoped.start(&context));
        let cleanup = match cleanups.len() {
            0 => None,
            1 => cleanups.pop(),
            _ => Some(Cleanup::all(cleanups)),
        };
        shared.install_effect(cleanup);

        if let Some(reaction) = shared.table.reaction(entry.name()) {
            reaction(&context);
        }

        shared.run_drains(entry)?;
        Ok(Self { shared })
    }
}

impl<S: State, A: Action, C: Command> Shared<S, A, C> {
    pub(crate) fn destroy(&self) -> Result<(), MachineError> {
        let (revoked, effect, global_effect) = {
            let mut core = self.lock();
            if core.destroyed {
                drop(core);
                return self.destroyed_call("destroy");
            }
            core.destroyed = true;
            core.queue.clear();
            (
                core.running.revoke_all(),
                core.effect.take(),
                core.global_effect.take(),
            )
        };

        self.cancel_all(revoked);

        let mut vetoed = None;
        for (scope, cleanup) in [
            (EffectScope::State, effect),
            (EffectScope::Global, global_effect),
        ] {
            if let Some(mut cleanup) = cleanup {
                if cleanup.run() == Teardown::Veto {
                    vetoed.get_or_insert(scope);
                }
            }
        }

        self.relay.destroy();

        match vetoed {
            Some(scope) => Err(MachineError::CleanupVetoedOnDestroy { scope }),
            None => Ok(()),
        }
    }
}

impl<S: State, A: Action, C: Command> Drop for Shared<S, A, C> {
    fn drop(&mut self) {
        let destroyed = self.lock().destroyed;
        if destroyed {
            return;
        }
        if let Err(error) = self.destroy() {
            tracing::warn!(error = %error, "teardown of a dropped machine failed");
        }
    }
}
