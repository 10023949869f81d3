//! Diagnostics sink.
//!
//! The machine never prints. Everything worth reporting is handed to an
//! [`Observer`] as a [`Diagnostic`]; the default [`TracingObserver`] turns
//! diagnostics into `tracing` events.

use crate::commands::CancelReason;
use crate::transition::{GateRejection, TransitionError, UnhandledReason};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Warn,
    Error,
}

/// Something the machine wants to report.
#[derive(Debug, Clone, Copy)]
pub enum Diagnostic<'a> {
    /// A new state value was adopted.
    Transitioned {
        from: &'a str,
        to: &'a str,
        action: &'a str,
    },
    /// The rule kept the current value.
    SameState { state: &'a str, action: &'a str },
    /// The rule or its guard declined the action.
    Cancelled { state: &'a str, action: &'a str },
    /// No rule exists for the action in the current state.
    Unhandled {
        state: &'a str,
        action: &'a str,
        reason: UnhandledReason,
    },
    /// The rule failed; the machine falls back to its error handling.
    TransitionFailed {
        state: &'a str,
        action: &'a str,
        error: &'a TransitionError,
    },
    EffectStarted { state: &'a str },
    /// A cleanup refused to tear down.
    CleanupVetoed { state: &'a str, honored: bool },
    CommandRejected {
        state: &'a str,
        command: &'a str,
        reason: GateRejection,
    },
    CommandCancelled {
        command: &'a str,
        reason: &'a CancelReason,
    },
    ShortcutRejected {
        from: &'a str,
        to: &'a str,
        reason: GateRejection,
    },
    /// An operation was called on a destroyed machine.
    DestroyedCall { operation: &'a str },
    /// Subscribers are about to be notified.
    Emitting { state: &'a str },
}

impl Diagnostic<'_> {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Transitioned { .. }
            | Self::SameState { .. }
            | Self::Cancelled { .. }
            | Self::EffectStarted { .. }
            | Self::CommandCancelled { .. }
            | Self::Emitting { .. } => Severity::Debug,
            Self::Unhandled { .. }
            | Self::CleanupVetoed { .. }
            | Self::CommandRejected { .. }
            | Self::ShortcutRejected { .. }
            | Self::DestroyedCall { .. } => Severity::Warn,
            Self::TransitionFailed { .. } => Severity::Error,
        }
    }
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transitioned { from, to, action } => {
                write!(f, "{action}: {from} -> {to}")
            }
            Self::SameState { state, action } => {
                write!(f, "{action} kept state {state}")
            }
            Self::Cancelled { state, action } => {
                write!(f, "{action} ignored in {state}")
            }
            Self::Unhandled {
                state,
                action,
                reason,
            } => write!(f, "{action} not handled in {state}: {reason}"),
            Self::TransitionFailed {
                state,
                action,
                error,
            } => write!(f, "{action} failed in {state}: {error}"),
            Self::EffectStarted { state } => write!(f, "effect started for {state}"),
            Self::CleanupVetoed { state, honored } => {
                if *honored {
                    write!(f, "cleanup vetoed leaving {state}, transition reverted")
                } else {
                    write!(f, "cleanup vetoed leaving {state}, veto ignored")
                }
            }
            Self::CommandRejected {
                state,
                command,
                reason,
            } => write!(f, "command {command} rejected in {state}: {reason}"),
            Self::CommandCancelled { command, reason } => {
                write!(f, "command {command} cancelled: {reason}")
            }
            Self::ShortcutRejected { from, to, reason } => {
                write!(f, "shortcut {from} -> {to} rejected: {reason}")
            }
            Self::DestroyedCall { operation } => {
                write!(f, "{operation} called on a destroyed machine")
            }
            Self::Emitting { state } => write!(f, "notifying subscribers of {state}"),
        }
    }
}

/// Receives every diagnostic of a machine.
///
/// `label` is the machine's debug label, if one was configured.
pub trait Observer: Send + Sync {
    fn observe(&self, label: Option<&str>, diagnostic: &Diagnostic<'_>);
}

/// Forwards diagnostics to `tracing`.
///
/// Debug-level diagnostics are only emitted for machines with a debug label.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn observe(&self, label: Option<&str>, diagnostic: &Diagnostic<'_>) {
        match diagnostic.severity() {
            Severity::Debug => {
                if let Some(label) = label {
                    tracing::debug!(machine = %label, "{}", diagnostic);
                }
            }
            Severity::Warn => {
                tracing::warn!(machine = %label.unwrap_or("-"), "{}", diagnostic);
            }
            Severity::Error => {
                tracing::error!(machine = %label.unwrap_or("-"), "{}", diagnostic);
            }
        }
    }
}
