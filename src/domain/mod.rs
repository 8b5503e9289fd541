//! Domain layer: event types, connection state, and the shared callback
//! collections.
//!
//! This module contains the client-side model: the typed push events, the
//! connection state machine's states, the subscription registry that routes
//! events to subscribers, and the broadcaster that reports connectivity.

pub mod connection_state;
pub mod event;
pub mod listener_set;
pub mod status_broadcaster;
pub mod subscription_registry;

pub use connection_state::{ConnectionState, StatusEvent};
pub use event::{Event, EventType};
pub use listener_set::{Callback, ListenerId, ListenerSet};
pub use status_broadcaster::{StatusBroadcaster, StatusListener, StatusSubscription};
pub use subscription_registry::{EventCallback, Subscription, SubscriptionRegistry};
