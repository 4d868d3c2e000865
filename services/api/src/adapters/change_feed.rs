//! services/api/src/adapters/change_feed.rs
//!
//! An in-process implementation of the `ChangeFeed` port. Subscribers register
//! a callback with a table/user filter; `publish` fans each change out to them.

use humanizer_core::domain::RowChange;
use humanizer_core::ports::{ChangeCallback, ChangeFeed, ChangeFilter, Subscription};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::error;

struct Subscriber {
    filter: ChangeFilter,
    callback: ChangeCallback,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
}

impl Registry {
    fn remove(&self, id: u64) {
        match self.subscribers.lock() {
            Ok(mut subs) => {
                subs.remove(&id);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(&id);
            }
        }
    }
}

/// Fans row changes out to in-process subscribers.
#[derive(Clone, Default)]
pub struct InMemoryChangeFeed {
    registry: Arc<Registry>,
}

impl InMemoryChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .subscribers
            .lock()
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

impl ChangeFeed for InMemoryChangeFeed {
    fn subscribe(&self, filter: ChangeFilter, callback: ChangeCallback) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        match self.registry.subscribers.lock() {
            Ok(mut subs) => {
                subs.insert(id, Subscriber { filter, callback });
            }
            Err(_) => error!("Change feed registry is poisoned; subscription {} inactive", id),
        }

        // Hold only a weak reference so a lingering handle never keeps the feed alive.
        let registry: Weak<Registry> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        })
    }

    fn publish(&self, change: &RowChange) {
        // Collect first so callbacks run without the lock held.
        let callbacks: Vec<ChangeCallback> = match self.registry.subscribers.lock() {
            Ok(subs) => subs
                .values()
                .filter(|s| s.filter.matches(change))
                .map(|s| s.callback.clone())
                .collect(),
            Err(_) => {
                error!("Change feed registry is poisoned; dropping change {:?}", change);
                return;
            }
        };
        for callback in callbacks {
            callback(change);
        }
    }
}
