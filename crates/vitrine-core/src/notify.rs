#![forbid(unsafe_code)]

//! Change notification for engine outputs.
//!
//! # Design
//!
//! [`Notifier<T>`] holds subscriber callbacks as `Weak` references; the
//! strong side lives in the [`Listener`] guard handed back by
//! [`Notifier::subscribe`]. Dropping the guard unsubscribes, so a consumer
//! that unmounts can never be called again and nothing accumulates across
//! repeated mount/unmount cycles.
//!
//! The engine is single-threaded and frame-scheduled, so storage is
//! `Rc<RefCell<..>>` rather than anything `Send`.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. A dropped guard is never invoked again; its slot is pruned on the next
//!    [`emit`](Notifier::emit).
//! 3. Emitting from inside a callback is allowed: callbacks are collected
//!    before any of them run.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

type CallbackRc<T> = Rc<RefCell<dyn FnMut(&T)>>;
type CallbackWeak<T> = Weak<RefCell<dyn FnMut(&T)>>;

/// Subscriber list for one output value type.
pub struct Notifier<T> {
    subscribers: Rc<RefCell<Vec<CallbackWeak<T>>>>,
}

impl<T> Default for Notifier<T> {
    fn default() -> Self {
        Self {
            subscribers: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl<T> std::fmt::Debug for Notifier<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("subscriber_count", &self.subscribers.borrow().len())
            .finish()
    }
}

impl<T: 'static> Notifier<T> {
    /// Create an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Keep the returned guard alive for as long as
    /// the callback should fire.
    #[must_use = "dropping the listener unsubscribes immediately"]
    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> Listener {
        let strong: CallbackRc<T> = Rc::new(RefCell::new(callback));
        self.subscribers.borrow_mut().push(Rc::downgrade(&strong));
        Listener {
            _guard: Box::new(strong),
        }
    }

    /// Deliver `value` to every live subscriber and prune dead ones.
    pub fn emit(&self, value: &T) {
        let callbacks: Vec<CallbackRc<T>> = {
            let mut subs = self.subscribers.borrow_mut();
            subs.retain(|w| w.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in callbacks {
            // A callback that re-enters itself is skipped rather than panicking.
            if let Ok(mut f) = callback.try_borrow_mut() {
                f(value);
            }
        }
    }

    /// Number of registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Number of subscribers whose guard is still alive.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

/// RAII guard for a [`Notifier`] subscription.
#[must_use = "dropping the listener unsubscribes immediately"]
pub struct Listener {
    _guard: Box<dyn Any>,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_registration_order() {
        let notifier = Notifier::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l1 = log.clone();
        let _a = notifier.subscribe(move |v| l1.borrow_mut().push(("a", *v)));
        let l2 = log.clone();
        let _b = notifier.subscribe(move |v| l2.borrow_mut().push(("b", *v)));

        notifier.emit(&7);
        assert_eq!(*log.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn dropped_listener_is_not_called_and_is_pruned() {
        let notifier = Notifier::<u32>::new();
        let hits = Rc::new(RefCell::new(0));

        let h = hits.clone();
        let guard = notifier.subscribe(move |_| *h.borrow_mut() += 1);
        notifier.emit(&1);
        drop(guard);
        assert_eq!(notifier.live_count(), 0);
        notifier.emit(&2);

        assert_eq!(*hits.borrow(), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn callbacks_can_mutate_captured_state() {
        let notifier = Notifier::<f64>::new();
        let last = Rc::new(RefCell::new(None));
        let l = last.clone();
        let _g = notifier.subscribe(move |v| *l.borrow_mut() = Some(*v));
        notifier.emit(&0.25);
        assert_eq!(*last.borrow(), Some(0.25));
    }
}
