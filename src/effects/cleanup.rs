//! Teardown handles returned by effects.

use std::fmt;

/// What a cleanup reports back when asked to tear down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The activation is gone.
    Done,
    /// The cleanup refuses to tear down right now.
    Veto,
}

enum Inner {
    Once(Option<Box<dyn FnOnce() + Send>>),
    Vetoable(Box<dyn FnMut() -> Teardown + Send>),
    All(Vec<Cleanup>),
}

/// Teardown of one effect activation.
///
/// A cleanup latches after its first successful run: running it again is a
/// no-op that reports [`Teardown::Done`]. A vetoable cleanup only latches once
/// it stops vetoing.
///
/// # Example
///
/// ```rust
/// use switchyard::effects::{Cleanup, Teardown};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&runs);
/// let mut cleanup = Cleanup::new(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// assert_eq!(cleanup.run(), Teardown::Done);
/// assert_eq!(cleanup.run(), Teardown::Done);
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
pub struct Cleanup {
    inner: Inner,
    finished: bool,
}

impl Cleanup {
    /// Cleanup that runs `teardown` exactly once.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner: Inner::Once(Some(Box::new(teardown))),
            finished: false,
        }
    }

    /// Cleanup that may refuse to tear down.
    ///
    /// The machine only honors the veto when `vetoable_cleanup` is enabled.
    pub fn vetoable<F>(teardown: F) -> Self
    where
        F: FnMut() -> Teardown + Send + 'static,
    {
        Self {
            inner: Inner::Vetoable(Box::new(teardown)),
            finished: false,
        }
    }

    /// Combine several cleanups into one activation.
    ///
    /// Parts run in order. The combined cleanup vetoes if any part vetoes;
    /// parts that already finished are not run again.
    pub fn all(parts: impl IntoIterator<Item = Cleanup>) -> Self {
        Self {
            inner: Inner::All(parts.into_iter().collect()),
            finished: false,
        }
    }

    /// Run the teardown unless it already finished.
    pub fn run(&mut self) -> Teardown {
        if self.finished {
            return Teardown::Done;
        }

        let outcome = match &mut self.inner {
            Inner::Once(teardown) => {
                if let Some(teardown) = teardown.take() {
                    teardown();
                }
                Teardown::Done
            }
            Inner::Vetoable(teardown) => teardown(),
            Inner::All(parts) => parts.iter_mut().fold(Teardown::Done, |outcome, part| {
                match part.run() {
                    Teardown::Veto => Teardown::Veto,
                    Teardown::Done => outcome,
                }
            }),
        };

        if outcome == Teardown::Done {
            self.finished = true;
        }
        outcome
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.inner {
            Inner::Once(_) => "once",
            Inner::Vetoable(_) => "vetoable",
            Inner::All(_) => "all",
        };
        f.debug_struct("Cleanup")
            .field("kind", &kind)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Holder of the single active activation.
#[derive(Debug, Default)]
pub(crate) struct EffectSlot {
    active: Option<Cleanup>,
}

impl EffectSlot {
    pub(crate) fn take(&mut self) -> Option<Cleanup> {
        self.active.take()
    }

    /// Put back a cleanup that vetoed its teardown.
    pub(crate) fn restore(&mut self, cleanup: Cleanup) {
        self.active = Some(cleanup);
    }

    pub(crate) fn install(&mut self, cleanup: Option<Cleanup>) {
        self.active = cleanup;
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.is_some()
    }
}
