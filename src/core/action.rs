//! Tagged inputs of a machine: actions that trigger transitions and commands
//! that start background work.

use std::fmt::Debug;

/// An input consumed by exactly one transition lookup.
///
/// # Example
///
/// ```rust
/// use switchyard::core::Action;
///
/// #[derive(Clone, Debug)]
/// enum Player {
///     Play,
///     Seek { position: u64 },
/// }
///
/// impl Action for Player {
///     fn name(&self) -> &str {
///         match self {
///             Self::Play => "Play",
///             Self::Seek { .. } => "Seek",
///         }
///     }
/// }
///
/// assert_eq!(Player::Seek { position: 10 }.name(), "Seek");
/// ```
pub trait Action: Clone + Debug + Send + Sync + 'static {
    /// The action's tag.
    fn name(&self) -> &str;
}

/// A request to start a state-gated background task.
///
/// The tag selects the command function registered on the builder and is
/// checked against the current state's allow-list.
pub trait Command: Debug + Send + Sync + 'static {
    /// The command's tag.
    fn name(&self) -> &str;
}

/// Command type for machines that never start commands.
///
/// It has no values, so `start` can never be called with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoCommand {}

impl Command for NoCommand {
    fn name(&self) -> &str {
        match *self {}
    }
}
