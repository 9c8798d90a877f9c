//! Priority-ordered clock subscriptions

use std::sync::Arc;

/// Handle returned by `subscribe_*`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

type Callback<A> = Arc<dyn Fn(A) + Send + Sync>;

struct Entry<A> {
    id: SubscriptionId,
    priority: i32,
    callback: Callback<A>,
}

/// Subscribers sorted by priority (lower first), insertion order within a priority
pub(crate) struct SubscriberList<A> {
    entries: Vec<Entry<A>>,
}

impl<A: Copy> SubscriberList<A> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, id: SubscriptionId, priority: i32, callback: Callback<A>) {
        let at = self
            .entries
            .iter()
            .position(|e| e.priority > priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            at,
            Entry {
                id,
                priority,
                callback,
            },
        );
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Callbacks in firing order; cloned so they can run without the lock
    pub(crate) fn snapshot(&self) -> Vec<Callback<A>> {
        self.entries.iter().map(|e| Arc::clone(&e.callback)).collect()
    }
}

/// Run callbacks in order
pub(crate) fn fire<A: Copy>(callbacks: &[Callback<A>], arg: A) {
    for callback in callbacks {
        callback(arg);
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_priority_then_insertion_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut list = SubscriberList::<u8>::new();
        for (id, priority, tag) in [(1, 5, "late"), (2, 0, "first"), (3, 5, "later"), (4, -1, "urgent")] {
            let order = order.clone();
            list.insert(SubscriptionId(id), priority, Arc::new(move |_| order.lock().push(tag)));
        }

        fire(&list.snapshot(), 0);
        assert_eq!(*order.lock(), vec!["urgent", "first", "late", "later"]);

        assert!(list.remove(SubscriptionId(2)));
        assert!(!list.remove(SubscriptionId(2)));
        assert_eq!(list.len(), 3);
    }
}
