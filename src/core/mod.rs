//! Core machine vocabulary.
//!
//! This module contains the pure building blocks every machine is written
//! against:
//! - State definitions via the `State` trait
//! - Tagged inputs via the `Action` and `Command` traits
//! - Guard predicates for transition control
//!
//! Nothing in this module has side effects; the runtime lives in
//! [`crate::machine`].

mod action;
mod guard;
mod state;

pub use action::{Action, Command, NoCommand};
pub use guard::Guard;
pub use state::State;
