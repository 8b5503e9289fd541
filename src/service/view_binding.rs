//! View lifecycle binding.
//!
//! Mounting a view connects the shared client (idempotent), subscribes to
//! the view's event types, listens for connectivity changes, and starts the
//! status poller. Dropping the binding undoes all of that except the
//! connection, which other views may still be using.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::StatusSource;
use crate::app_state::AppContext;
use crate::domain::listener_set::lock;
use crate::domain::{ConnectionState, Event, EventType, StatusEvent, StatusSubscription, Subscription};

/// Default interval between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// What a view wants from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSpec {
    name: String,
    event_types: Vec<EventType>,
    poll_interval: Duration,
}

impl ViewSpec {
    /// A view named `name` interested in `event_types`, polling every 5 s.
    #[must_use]
    pub fn new(name: impl Into<String>, event_types: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            name: name.into(),
            event_types: event_types.into_iter().collect(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// The trading dashboard: every event type it renders.
    #[must_use]
    pub fn dashboard() -> Self {
        Self::new("dashboard", EventType::DASHBOARD)
    }

    /// Overrides the poll interval. Zero is raised to one millisecond.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// View name, used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event types the view subscribes to.
    #[must_use]
    pub fn event_types(&self) -> &[EventType] {
        &self.event_types
    }

    /// Interval between status polls.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

/// An event together with the time it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedEvent {
    /// The event as dispatched.
    pub event: Event,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

/// Everything a view renders from: the latest event of each type, the
/// latest polled status, and connectivity.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    latest: HashMap<EventType, ReceivedEvent>,
    polled_status: Option<Value>,
    last_polled_at: Option<DateTime<Utc>>,
    last_poll_error: Option<String>,
    connection: ConnectionState,
    reconnect_exhausted: bool,
}

impl ViewState {
    /// Most recent event of `event_type`, if one has arrived.
    #[must_use]
    pub fn latest(&self, event_type: &EventType) -> Option<&ReceivedEvent> {
        self.latest.get(event_type)
    }

    /// Number of event types that have delivered at least one event.
    #[must_use]
    pub fn event_type_count(&self) -> usize {
        self.latest.len()
    }

    /// Most recent successful status poll.
    #[must_use]
    pub const fn polled_status(&self) -> Option<&Value> {
        self.polled_status.as_ref()
    }

    /// When the last successful poll completed.
    #[must_use]
    pub const fn last_polled_at(&self) -> Option<DateTime<Utc>> {
        self.last_polled_at
    }

    /// Error from the most recent poll, cleared by the next success.
    #[must_use]
    pub fn last_poll_error(&self) -> Option<&str> {
        self.last_poll_error.as_deref()
    }

    /// Connection state as last reported.
    #[must_use]
    pub const fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Whether automatic reconnection has given up since the last open.
    #[must_use]
    pub const fn reconnect_exhausted(&self) -> bool {
        self.reconnect_exhausted
    }

    /// Replaces the stored event of the same type.
    fn record_event(&mut self, event: &Event) {
        self.latest.insert(
            event.event_type().clone(),
            ReceivedEvent {
                event: event.clone(),
                received_at: Utc::now(),
            },
        );
    }

    fn record_status(&mut self, status: &StatusEvent) {
        match status {
            StatusEvent::StateChanged(state) => {
                self.connection = *state;
                if *state == ConnectionState::Open {
                    self.reconnect_exhausted = false;
                }
            }
            StatusEvent::ReconnectExhausted { .. } => self.reconnect_exhausted = true,
        }
    }

    fn record_poll(&mut self, status: Value) {
        self.polled_status = Some(status);
        self.last_polled_at = Some(Utc::now());
        self.last_poll_error = None;
    }
}

/// A mounted view. Dropping it unmounts the view.
pub struct ViewBinding {
    name: String,
    state: Arc<Mutex<ViewState>>,
    subscriptions: Vec<Subscription>,
    status_subscription: StatusSubscription,
    poller: JoinHandle<()>,
}

impl fmt::Debug for ViewBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewBinding")
            .field("name", &self.name)
            .field("subscriptions", &self.subscriptions.len())
            .field("status_subscription", &self.status_subscription)
            .finish_non_exhaustive()
    }
}

impl ViewBinding {
    /// Mounts a view described by `spec` on the shared client in `context`.
    pub fn mount(context: &AppContext, spec: ViewSpec) -> Self {
        let client = &context.client;
        let state = Arc::new(Mutex::new(ViewState::default()));

        let subscriptions = spec
            .event_types()
            .iter()
            .map(|event_type| {
                let state = Arc::clone(&state);
                client.subscribe_fn(event_type.clone(), move |event: &Event| {
                    lock(&state).record_event(event);
                })
            })
            .collect();

        let status_state = Arc::clone(&state);
        let status_subscription = client.on_status_change(Arc::new(move |status: &StatusEvent| {
            lock(&status_state).record_status(status);
        }));

        // Listeners go in before connecting so frames sent on open are not missed.
        client.connect();
        {
            let mut view = lock(&state);
            view.connection = client.state();
        }

        let poller = client.spawn(poll_status(
            spec.name().to_string(),
            Arc::clone(&context.status_source),
            Arc::clone(&state),
            spec.poll_interval(),
        ));

        tracing::info!(
            view = spec.name(),
            event_types = spec.event_types().len(),
            poll_ms = u64::try_from(spec.poll_interval().as_millis()).unwrap_or(u64::MAX),
            "view mounted"
        );

        Self {
            name: spec.name,
            state,
            subscriptions,
            status_subscription,
            poller,
        }
    }

    /// View name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of the view's current state.
    #[must_use]
    pub fn snapshot(&self) -> ViewState {
        lock(&self.state).clone()
    }

    /// Unmounts the view now.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for ViewBinding {
    fn drop(&mut self) {
        self.poller.abort();
        // Subscriptions and the status listener release themselves as the
        // fields drop; the shared connection is left alone.
        tracing::info!(view = %self.name, "view unmounted");
    }
}

/// Polls `source` every `period`, first poll immediately.
async fn poll_status(
    view: String,
    source: Arc<dyn StatusSource>,
    state: Arc<Mutex<ViewState>>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match source.fetch_status().await {
            Ok(status) => {
                lock(&state).record_poll(status);
                tracing::trace!(view = %view, "status polled");
            }
            Err(e) => {
                tracing::warn!(view = %view, error = %e, "status poll failed");
                lock(&state).last_poll_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(event_type: EventType, data: Value) -> Event {
        Event::new(event_type, data.clone(), None, json!({"data": data}))
    }

    #[test]
    fn later_event_replaces_earlier_of_same_type() {
        let mut state = ViewState::default();
        state.record_event(&event(EventType::MarketUpdate, json!({"price": 1})));
        state.record_event(&event(EventType::PositionUpdate, json!({"size": 0.1})));
        state.record_event(&event(EventType::MarketUpdate, json!({"price": 2})));

        assert_eq!(state.event_type_count(), 2);
        let Some(latest) = state.latest(&EventType::MarketUpdate) else {
            panic!("market update expected");
        };
        assert_eq!(latest.event.data(), &json!({"price": 2}));
    }

    #[test]
    fn open_clears_exhaustion_flag() {
        let mut state = ViewState::default();
        state.record_status(&StatusEvent::ReconnectExhausted { attempts: 10 });
        assert!(state.reconnect_exhausted());
        state.record_status(&StatusEvent::StateChanged(ConnectionState::Connecting));
        assert!(state.reconnect_exhausted());
        state.record_status(&StatusEvent::StateChanged(ConnectionState::Open));
        assert!(!state.reconnect_exhausted());
        assert_eq!(state.connection(), ConnectionState::Open);
    }

    #[test]
    fn successful_poll_clears_error() {
        let mut state = ViewState {
            last_poll_error: Some("timeout".to_string()),
            ..ViewState::default()
        };
        state.record_poll(json!({"status": "running"}));
        assert!(state.last_poll_error().is_none());
        assert!(state.last_polled_at().is_some());
        assert_eq!(state.polled_status(), Some(&json!({"status": "running"})));
    }

    #[test]
    fn dashboard_spec_covers_dashboard_events() {
        let spec = ViewSpec::dashboard();
        assert_eq!(spec.event_types(), &EventType::DASHBOARD);
        assert_eq!(spec.poll_interval(), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn zero_poll_interval_is_raised() {
        let spec = ViewSpec::new("v", Vec::new()).with_poll_interval(Duration::ZERO);
        assert_eq!(spec.poll_interval(), Duration::from_millis(1));
    }
}
