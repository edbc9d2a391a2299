//! Synchronous listener fan-out shared by every stateful component.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Observer set with monotonic subscription ids.
///
/// Listeners are invoked synchronously on each emit, in subscription order.
/// A listener may subscribe or unsubscribe re-entrantly; emits in flight use
/// the listener set captured at emit time.
pub struct Listeners<E> {
    entries: RefCell<Vec<(SubscriptionId, Rc<dyn Fn(&E)>)>>,
    next_id: Cell<u64>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn subscribe(&self, listener: Rc<dyn Fn(&E)>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.entries.borrow_mut().push((id, listener));
        id
    }

    /// Removes a listener; returns whether it was present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Rc<dyn Fn(&E)>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}
