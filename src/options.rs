//! Runtime options of a machine.

use serde::{Deserialize, Serialize};

/// Default bound on steps processed beyond the first per outer call.
pub const DEFAULT_MAX_RECURSIVE_DISPATCH: usize = 1000;

/// Behavior switches, loadable from any serde format.
///
/// Missing fields fall back to their defaults:
///
/// ```rust
/// use switchyard::MachineOptions;
///
/// let options: MachineOptions = serde_json::from_str(r#"{ "strict": true }"#).unwrap();
/// assert!(options.strict);
/// assert_eq!(options.max_recursive_dispatch, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineOptions {
    /// Turn warnings (unhandled actions, commands, shortcuts and calls after
    /// destroy) into errors.
    pub strict: bool,
    /// Label attached to diagnostics; enables debug-level tracing.
    pub debug: Option<String>,
    pub max_recursive_dispatch: usize,
    /// Let cleanups veto a pending transition.
    pub vetoable_cleanup: bool,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self {
            strict: false,
            debug: None,
            max_recursive_dispatch: DEFAULT_MAX_RECURSIVE_DISPATCH,
            vetoable_cleanup: false,
        }
    }
}
