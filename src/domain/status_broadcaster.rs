//! Connectivity notifications.
//!
//! [`StatusBroadcaster`] fans each [`StatusEvent`] out to listeners that care
//! about connectivity only, not event payloads. Listeners run synchronously,
//! in registration order, on whichever task performed the transition.

use std::fmt;
use std::sync::{Arc, Weak};

use super::StatusEvent;
use super::listener_set::{Callback, ListenerId, ListenerSet};

/// Listener invoked with every [`StatusEvent`].
pub type StatusListener = Callback<StatusEvent>;

/// Broadcasts connection status to registered listeners.
///
/// Cloning is cheap; all clones share the same listeners.
#[derive(Debug, Clone, Default)]
pub struct StatusBroadcaster {
    listeners: Arc<ListenerSet<StatusEvent>>,
}

impl StatusBroadcaster {
    /// Creates a broadcaster with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener`. The returned handle removes it on drop.
    pub fn on_status_change(&self, listener: StatusListener) -> StatusSubscription {
        let id = self.listeners.insert(listener);
        StatusSubscription {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }

    /// Removes `listener`. No-op if it is not registered.
    pub fn off_status_change(&self, listener: &StatusListener) -> bool {
        self.listeners.remove_callback(listener)
    }

    /// Delivers `event` to every listener. Returns how many were invoked.
    pub fn broadcast(&self, event: StatusEvent) -> usize {
        self.listeners.notify(&event, "status")
    }

    /// Current number of listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// Handle to a registered status listener; removes it on drop.
#[must_use = "dropping a StatusSubscription removes the listener immediately"]
pub struct StatusSubscription {
    listeners: Weak<ListenerSet<StatusEvent>>,
    id: ListenerId,
}

impl StatusSubscription {
    /// Removes the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for StatusSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscription")
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}
