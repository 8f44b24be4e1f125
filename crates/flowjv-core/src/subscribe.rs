//! Path subscriptions.
//!
//! The router never runs during a mutation. [`crate::Form`] applies the
//! write, lets the store settle, then hands the resulting [`Changes`] to
//! [`Router::dispatch`], so every callback sees the final state and fires at
//! most once per mutation no matter how many of its paths moved.

use crate::path::Path;
use crate::store::{Changes, Store};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Subscriber hook. `Send` so a [`crate::Form`] can move between threads.
pub type Callback = Box<dyn FnMut(&Path, &Store) + Send>;

struct Subscription {
    path: Path,
    callback: Callback,
}

#[derive(Default)]
pub struct Router {
    next_id: u64,
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let paths: Vec<String> = self.subscriptions.values().map(|s| s.path.to_string()).collect();
        f.debug_struct("Router").field("subscriptions", &paths).finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, path: Path, callback: F) -> SubscriptionId
    where
        F: FnMut(&Path, &Store) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.insert(
            id,
            Subscription {
                path,
                callback: Box::new(callback),
            },
        );
        id
    }

    /// Returns `false` if `id` was never issued or is already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Notify every subscriber whose path is affected by `changes`, in
    /// subscription order. Returns how many callbacks ran.
    pub fn dispatch(&mut self, changes: &Changes, store: &Store) -> usize {
        if changes.is_empty() {
            return 0;
        }
        let mut fired = 0;
        for (id, sub) in &mut self.subscriptions {
            if changes.affects(&sub.path, store) {
                trace!(subscription = %id, path = %sub.path, "notify");
                (sub.callback)(&sub.path, store);
                fired += 1;
            }
        }
        fired
    }
}
