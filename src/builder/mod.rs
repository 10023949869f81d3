//! Builder API for machine construction.
//!
//! [`MachineBuilder`] collects the transition table, callbacks and options,
//! validates them all at once and boots the machine. [`StateBuilder`]
//! describes a single state tag. The macros generate trait implementations
//! for fieldless enums.

pub mod error;
pub mod machine;
pub mod macros;
pub mod state;

pub use error::{BuildError, BuildErrors};
pub use machine::MachineBuilder;
pub use state::StateBuilder;
