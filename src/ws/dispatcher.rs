//! Routes decoded frames to subscribers.
//!
//! The dispatcher is stateless apart from its handle on the registry: it
//! keeps no event history, and every failure (bad frame, panicking
//! subscriber) is logged and absorbed.

use crate::domain::{EventType, SubscriptionRegistry};
use crate::error::DecodeError;

use super::messages::decode_frame;

/// Result of dispatching one raw frame.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The event reached this many subscribers.
    Delivered(usize),
    /// The frame decoded, but nobody subscribes to its type.
    NoSubscribers(EventType),
    /// The frame could not be decoded and was dropped.
    Dropped(DecodeError),
}

impl DispatchOutcome {
    /// Number of callbacks that were invoked.
    #[must_use]
    pub const fn delivered(&self) -> usize {
        match self {
            Self::Delivered(n) => *n,
            Self::NoSubscribers(_) | Self::Dropped(_) => 0,
        }
    }
}

/// Decodes inbound frames and fans them out via the [`SubscriptionRegistry`].
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    registry: SubscriptionRegistry,
}

impl EventDispatcher {
    /// Creates a dispatcher routing through `registry`.
    #[must_use]
    pub const fn new(registry: SubscriptionRegistry) -> Self {
        Self { registry }
    }

    /// The registry this dispatcher routes through.
    #[must_use]
    pub const fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Decodes `raw` and invokes every subscriber of its type, in
    /// registration order, within this call.
    pub fn dispatch(&self, raw: &str) -> DispatchOutcome {
        let event = match decode_frame(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(
                    reason = e.reason(),
                    error = %e,
                    frame_len = raw.len(),
                    "dropping undecodable frame"
                );
                return DispatchOutcome::Dropped(e);
            }
        };

        let Some(listeners) = self.registry.listeners(event.event_type()) else {
            tracing::trace!(event_type = %event.event_type(), "no subscribers for event");
            return DispatchOutcome::NoSubscribers(event.event_type().clone());
        };

        let delivered = listeners.notify(&event, event.event_type().as_str());
        tracing::debug!(event_type = %event.event_type(), delivered, "event dispatched");
        DispatchOutcome::Delivered(delivered)
    }
}
