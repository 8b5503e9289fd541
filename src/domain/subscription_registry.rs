//! Process-wide subscription registry.
//!
//! Maps each [`EventType`] to the ordered set of callbacks subscribed to it.
//! The registry outlives any single view: views hold [`Subscription`]
//! handles and release them on drop.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use super::listener_set::{Callback, ListenerId, ListenerSet, lock};
use super::{Event, EventType};

/// Callback invoked with each dispatched [`Event`].
pub type EventCallback = Callback<Event>;

#[derive(Debug, Default)]
struct RegistryInner {
    by_type: Mutex<HashMap<EventType, Arc<ListenerSet<Event>>>>,
}

impl RegistryInner {
    fn remove(&self, event_type: &EventType, id: ListenerId) -> bool {
        let mut map = lock(&self.by_type);
        let Some(set) = map.get(event_type) else {
            return false;
        };
        let removed = set.remove(id);
        if set.is_empty() {
            map.remove(event_type);
        }
        removed
    }
}

/// Shared registry of event subscriptions.
///
/// Cloning is cheap; all clones share the same subscriptions.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `callback` to `event_type`.
    ///
    /// Registering the same `Arc` twice for one type delivers each event
    /// once; both handles then refer to the same entry, and releasing either
    /// removes it.
    pub fn subscribe(&self, event_type: EventType, callback: EventCallback) -> Subscription {
        let id = {
            let mut map = lock(&self.inner.by_type);
            map.entry(event_type.clone())
                .or_insert_with(|| Arc::new(ListenerSet::new()))
                .insert(callback)
        };
        tracing::debug!(event_type = %event_type, "subscriber added");
        Subscription {
            registry: Arc::downgrade(&self.inner),
            event_type,
            id,
            released: false,
        }
    }

    /// Convenience wrapper around [`SubscriptionRegistry::subscribe`] for
    /// closures.
    pub fn subscribe_fn<F>(&self, event_type: EventType, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribe(event_type, Arc::new(callback))
    }

    /// Removes `callback` from `event_type`. No-op if it is not registered.
    pub fn unsubscribe(&self, event_type: &EventType, callback: &EventCallback) -> bool {
        let mut map = lock(&self.inner.by_type);
        let Some(set) = map.get(event_type) else {
            return false;
        };
        let removed = set.remove_callback(callback);
        if set.is_empty() {
            map.remove(event_type);
        }
        if removed {
            tracing::debug!(event_type = %event_type, "subscriber removed");
        }
        removed
    }

    /// Returns the listener set for `event_type`, if anyone subscribed.
    ///
    /// The set is returned by `Arc` so a dispatch pass can run without
    /// holding the registry lock.
    #[must_use]
    pub fn listeners(&self, event_type: &EventType) -> Option<Arc<ListenerSet<Event>>> {
        lock(&self.inner.by_type).get(event_type).map(Arc::clone)
    }

    /// Number of subscribers for `event_type`.
    #[must_use]
    pub fn count(&self, event_type: &EventType) -> usize {
        self.listeners(event_type).map_or(0, |set| set.len())
    }

    /// Event types with at least one subscriber.
    #[must_use]
    pub fn subscribed_types(&self) -> Vec<EventType> {
        lock(&self.inner.by_type).keys().cloned().collect()
    }
}

/// Handle to one registered subscription.
///
/// Dropping the handle unsubscribes. Call [`Subscription::unsubscribe`] to
/// release it explicitly.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
    registry: Weak<RegistryInner>,
    event_type: EventType,
    id: ListenerId,
    released: bool,
}

impl Subscription {
    /// The event type this subscription listens to.
    #[must_use]
    pub const fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// Returns `true` while the callback is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.released
            && self.registry.upgrade().is_some_and(|inner| {
                lock(&inner.by_type)
                    .get(&self.event_type)
                    .is_some_and(|set| set.contains(self.id))
            })
    }

    /// Unsubscribes now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(inner) = self.registry.upgrade()
            && inner.remove(&self.event_type, self.id)
        {
            tracing::debug!(event_type = %self.event_type, "subscriber removed");
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &self.event_type)
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
