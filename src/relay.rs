//! Subscriber fan-out for settled state changes.

use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<S> = Arc<dyn Fn(&Arc<S>) + Send + Sync>;
type OnUnsubscribed = Box<dyn FnOnce() + Send>;

struct Entry<S> {
    id: u64,
    listener: Listener<S>,
    on_unsubscribed: Option<OnUnsubscribed>,
}

struct Inner<S> {
    next_id: u64,
    entries: Vec<Entry<S>>,
    destroyed: bool,
}

/// Registry of state listeners.
///
/// Listeners are called outside the registry lock, so they may subscribe or
/// unsubscribe while being notified.
pub(crate) struct Relay<S> {
    inner: Mutex<Inner<S>>,
}

pub(crate) trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64) -> bool;
}

/// Registration returned by `subscribe`.
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    relay: Weak<dyn Unsubscribe>,
}

impl Subscription {
    /// A subscription that was never registered.
    pub(crate) fn detached() -> Self {
        Self {
            id: 0,
            relay: Weak::<Relay<()>>::new(),
        }
    }

    /// Remove the listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        self.relay
            .upgrade()
            .map(|relay| relay.unsubscribe(self.id))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl<S: Send + Sync + 'static> Relay<S> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                entries: Vec::new(),
                destroyed: false,
            }),
        }
    }

    /// Register a listener. Returns `None` once the relay is destroyed.
    pub(crate) fn subscribe(
        self: &Arc<Self>,
        listener: Listener<S>,
        on_unsubscribed: Option<OnUnsubscribed>,
    ) -> Option<Subscription> {
        let mut inner = self.lock();
        if inner.destroyed {
            return None;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push(Entry {
            id,
            listener,
            on_unsubscribed,
        });
        let relay: Weak<dyn Unsubscribe> = Arc::downgrade(self) as Weak<dyn Unsubscribe>;
        Some(Subscription { id, relay })
    }

    /// Call every listener with `state`.
    pub(crate) fn emit(&self, state: &Arc<S>) {
        let listeners: Vec<Listener<S>> = self
            .lock()
            .entries
            .iter()
            .map(|entry| Arc::clone(&entry.listener))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }

    /// Drop every listener, running their unsubscribe hooks.
    pub(crate) fn destroy(&self) {
        let entries = {
            let mut inner = self.lock();
            inner.destroyed = true;
            std::mem::take(&mut inner.entries)
        };
        for entry in entries {
            if let Some(hook) = entry.on_unsubscribed {
                hook();
            }
        }
    }

    #[cfg(test)]
    fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Send + Sync + 'static> Unsubscribe for Relay<S> {
    fn unsubscribe(&self, id: u64) -> bool {
        let removed = {
            let mut inner = self.lock();
            inner
                .entries
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| inner.entries.remove(index))
        };
        match removed {
            Some(entry) => {
                if let Some(hook) = entry.on_unsubscribed {
                    hook();
                }
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Listener<u32>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let listener: Listener<u32> = Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn emit_reaches_every_listener() {
        let relay = Arc::new(Relay::new());
        let (first, a) = counter();
        let (second, b) = counter();
        relay.subscribe(a, None);
        relay.subscribe(b, None);

        relay.emit(&Arc::new(7));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_runs_hook_once() {
        let relay = Arc::new(Relay::new());
        let hooks = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&hooks);
        let (count, listener) = counter();
        let subscription = relay
            .subscribe(
                listener,
                Some(Box::new(move || {
                    hook_count.fetch_add(1, Ordering::SeqCst);
                })),
            )
            .unwrap();

        assert!(subscription.unsubscribe());
        assert!(!subscription.unsubscribe());
        relay.emit(&Arc::new(1));

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(hooks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn destroy_unregisters_everyone() {
        let relay = Arc::new(Relay::new());
        let hooks = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hook_count = Arc::clone(&hooks);
            let (_, listener) = counter();
            relay.subscribe(
                listener,
                Some(Box::new(move || {
                    hook_count.fetch_add(1, Ordering::SeqCst);
                })),
            );
        }

        relay.destroy();

        assert!(relay.is_destroyed());
        assert!(relay.is_empty());
        assert_eq!(hooks.load(Ordering::SeqCst), 3);
        let (_, late) = counter();
        assert!(relay.subscribe(late, None).is_none());
    }

    #[test]
    fn listener_may_unsubscribe_itself_while_notified() {
        let relay: Arc<Relay<u32>> = Arc::new(Relay::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let inner_slot = Arc::clone(&slot);
        let subscription = relay
            .subscribe(
                Arc::new(move |_| {
                    if let Some(subscription) = inner_slot.lock().unwrap().as_ref() {
                        subscription.unsubscribe();
                    }
                }),
                None,
            )
            .unwrap();
        *slot.lock().unwrap() = Some(subscription);

        relay.emit(&Arc::new(3));

        assert!(relay.is_empty());
    }
}
