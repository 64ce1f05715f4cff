//! Single-threaded typed events with detach handles.
//!
//! `Event::subscribe` returns a `Subscription`; dropping it (or calling
//! `detach`) removes the listener. Dispatch works on a snapshot of the
//! listener list, so listeners may subscribe or detach while being called.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// Publisher side. Cloning shares the same listener list.
pub struct Event<T> {
    inner: Rc<RefCell<Listeners<T>>>,
}

impl<T: 'static> Event<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register `listener` until the returned handle is dropped.
    #[must_use = "dropping the subscription detaches the listener"]
    pub fn subscribe<F: FnMut(&T) + 'static>(&self, listener: F) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.entries.push((id, Rc::new(RefCell::new(listener))));
            id
        };
        let weak: Weak<RefCell<Listeners<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().entries.retain(|(eid, _)| *eid != id);
                }
            })),
        }
    }

    /// Call every listener with `value`, in subscription order.
    pub fn dispatch(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            // A listener that re-enters its own event is not called again.
            if let Ok(mut f) = listener.try_borrow_mut() {
                f(value);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.inner.borrow().entries.len())
            .finish()
    }
}

/// Detach handle returned by `Event::subscribe`.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn detach(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn dispatch_reaches_listeners_in_order() {
        let event = Event::<i32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        let _a = event.subscribe(move |v| l1.borrow_mut().push(("a", *v)));
        let _b = event.subscribe(move |v| l2.borrow_mut().push(("b", *v)));
        event.dispatch(&7);
        assert_eq!(*log.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn dropping_subscription_detaches() {
        let event = Event::<()>::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = event.subscribe(move |_| h.set(h.get() + 1));
        event.dispatch(&());
        drop(sub);
        event.dispatch(&());
        assert_eq!(hits.get(), 1);
        assert_eq!(event.listener_count(), 0);
    }

    #[test]
    fn detach_after_event_dropped_is_harmless() {
        let event = Event::<u8>::new();
        let sub = event.subscribe(|_| {});
        drop(event);
        sub.detach();
    }

    #[test]
    fn listener_may_detach_others_during_dispatch() {
        let event = Event::<()>::new();
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let s = Rc::clone(&slot);
        let _first = event.subscribe(move |_| {
            s.borrow_mut().take();
        });
        *slot.borrow_mut() = Some(event.subscribe(|_| {}));
        assert_eq!(event.listener_count(), 2);
        event.dispatch(&());
        assert_eq!(event.listener_count(), 1);
    }
}
