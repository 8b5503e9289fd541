//! Ordered set of callbacks that tolerates mutation during notification.
//!
//! [`ListenerSet`] is the storage behind both the subscription registry and
//! the status broadcaster. A notification pass snapshots the entries at its
//! start and releases the lock before invoking anything, so callbacks may
//! add or remove listeners (including themselves). Each entry carries an
//! `active` flag that removal clears; the pass checks it right before every
//! invocation, so a removed listener never fires again, and entries that
//! were not touched are invoked exactly once.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Shared callback invoked with a borrowed value.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identifier of a registered listener, unique within one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Entry<T: ?Sized> {
    id: ListenerId,
    callback: Callback<T>,
    active: Arc<AtomicBool>,
}

/// Registration-ordered callbacks with set semantics by callback identity.
pub struct ListenerSet<T: ?Sized> {
    entries: Mutex<Vec<Entry<T>>>,
    next_id: AtomicU64,
}

impl<T: ?Sized> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

impl<T: ?Sized> ListenerSet<T> {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `callback`, or returns the existing id if this exact `Arc` is
    /// already registered.
    pub fn insert(&self, callback: Callback<T>) -> ListenerId {
        let mut entries = lock(&self.entries);
        if let Some(existing) = entries
            .iter()
            .find(|entry| Arc::ptr_eq(&entry.callback, &callback))
        {
            return existing.id;
        }
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entries.push(Entry {
            id,
            callback,
            active: Arc::new(AtomicBool::new(true)),
        });
        id
    }

    /// Removes the listener with `id`. Returns `false` if it was not present.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = lock(&self.entries);
        let Some(pos) = entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        let entry = entries.remove(pos);
        entry.active.store(false, Ordering::Release);
        true
    }

    /// Removes the listener registered with this exact `Arc`.
    pub fn remove_callback(&self, callback: &Callback<T>) -> bool {
        let id = lock(&self.entries)
            .iter()
            .find(|entry| Arc::ptr_eq(&entry.callback, callback))
            .map(|entry| entry.id);
        id.is_some_and(|id| self.remove(id))
    }

    /// Returns `true` if `id` is still registered.
    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        lock(&self.entries).iter().any(|entry| entry.id == id)
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Invokes every listener registered at the start of the pass and still
    /// registered when its turn comes, in registration order.
    ///
    /// A panicking listener is caught and logged; the pass continues.
    /// Returns the number of listeners that were invoked.
    pub fn notify(&self, value: &T, context: &str) -> usize {
        let snapshot: Vec<(ListenerId, Callback<T>, Arc<AtomicBool>)> = lock(&self.entries)
            .iter()
            .map(|entry| {
                (
                    entry.id,
                    Arc::clone(&entry.callback),
                    Arc::clone(&entry.active),
                )
            })
            .collect();

        let mut invoked = 0;
        for (id, callback, active) in snapshot {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            invoked += 1;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(value))) {
                tracing::error!(
                    listener = id.0,
                    context,
                    panic = panic_message(panic.as_ref()),
                    "listener panicked; continuing with remaining listeners"
                );
            }
        }
        invoked
    }
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
