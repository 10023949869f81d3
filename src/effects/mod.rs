//! Per-state effects and their teardown.
//!
//! An effect is started when the machine settles on a state whose tag differs
//! from the previously settled one, or when a rule asks for a forced re-run.
//! It may hand back a [`Cleanup`]; the machine keeps at most one active
//! cleanup and runs it exactly once before the next effect starts or the
//! machine is destroyed.
//!
//! Cleanups built with [`Cleanup::vetoable`] can refuse to tear down. With
//! `vetoable_cleanup` enabled the refusal reverts the pending state change.

mod cleanup;
mod context;

pub use cleanup::{Cleanup, Teardown};
pub use context::{EffectContext, EffectFn, GlobalEffectFn, ReactionFn, ScopedEffects};

pub(crate) use cleanup::EffectSlot;
