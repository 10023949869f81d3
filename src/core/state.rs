//! Core State trait for machine states.
//!
//! The tag returned by [`State::name`] is what the transition table, the
//! effect manager and the command allow-lists are keyed on. Two values with the
//! same tag are "the same state" as far as effects are concerned.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Trait for machine states.
///
/// All methods are pure - no side effects. States are immutable values; the
/// machine wraps the current one in an `Arc` and never mutates it in place.
///
/// # Required Traits
///
/// - `Clone`: states must be cloneable so rules can derive new values
/// - `PartialEq`: states must be comparable for assertions and guards
/// - `Debug`: states must be debuggable for diagnostics
/// - `Serialize` + `Deserialize`: states must be serializable for inspection
/// - `Send` + `Sync` + `'static`: the machine handle is shared across threads
///
/// # Example
///
/// ```rust
/// use switchyard::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
/// enum Upload {
///     Idle,
///     Sending { bytes: u64 },
///     Failed { message: String },
/// }
///
/// impl State for Upload {
///     fn name(&self) -> &str {
///         match self {
///             Self::Idle => "Idle",
///             Self::Sending { .. } => "Sending",
///             Self::Failed { .. } => "Failed",
///         }
///     }
///
///     fn is_error(&self) -> bool {
///         matches!(self, Self::Failed { .. })
///     }
/// }
///
/// assert_eq!(Upload::Sending { bytes: 3 }.name(), "Sending");
/// ```
pub trait State:
    Clone + PartialEq + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// The state's tag.
    ///
    /// Payload-carrying variants must return the same tag regardless of their
    /// payload.
    fn name(&self) -> &str;

    /// Check if this is a final (terminal) state.
    ///
    /// Default implementation returns `false`.
    fn is_final(&self) -> bool {
        false
    }

    /// Check if this is an error state.
    ///
    /// Default implementation returns `false`.
    fn is_error(&self) -> bool {
        false
    }
}
