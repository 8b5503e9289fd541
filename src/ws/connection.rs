//! The shared push connection.
//!
//! [`EventClient`] owns the one live socket, its state machine, and the
//! reconnect timer. It is created once at startup and cloned into every
//! consumer; clones share everything.
//!
//! # State machine
//!
//! ```text
//!            connect()             socket opened
//!  Closed ─────────────▶ Connecting ─────────────▶ Open
//!    ▲  ▲                    │                      │  │
//!    │  └── attempt failed ──┘                      │  │ close()
//!    │      (retry scheduled)                       │  ▼
//!    └──────────── peer closed / error ─────────────┘ Closing ──▶ Closed
//!                  (retry scheduled)                        (no retry)
//! ```
//!
//! Every socket task carries the generation number it was started with; a
//! transition requested by a task whose generation is no longer current is
//! ignored, so an abandoned attempt can never disturb a newer connection.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::dispatcher::EventDispatcher;
use super::messages::ClientMessage;
use super::reconnect::{PendingRetry, ReconnectPolicy, ReconnectState, ReconnectStatus, RetryDecision};
use super::transport::{Connector, TransportChannels, TungsteniteConnector};
use crate::config::ClientConfig;
use crate::domain::listener_set::lock;
use crate::domain::{
    ConnectionState, Event, EventCallback, EventType, StatusBroadcaster, StatusEvent,
    StatusListener, StatusSubscription, Subscription, SubscriptionRegistry,
};
use crate::error::ClientError;

/// Commands from the client handle to the socket task.
#[derive(Debug)]
enum Outbound {
    Frame(String),
    Close,
}

/// Why a socket task ended.
#[derive(Debug)]
enum CloseCause {
    /// The caller asked for the close.
    Requested,
    /// The peer closed or the stream ended.
    Remote,
    /// Connecting or reading/writing failed.
    Failed(ClientError),
}

/// Who asked for a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenOrigin {
    Caller,
    Retry(u64),
}

#[derive(Debug, Default)]
struct ConnectionCore {
    state: ConnectionState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    socket_task: Option<JoinHandle<()>>,
    reconnect: ReconnectState,
    shut_down: bool,
}

struct Inner {
    url: String,
    policy: ReconnectPolicy,
    keepalive: Option<Duration>,
    shutdown_timeout: Duration,
    connector: Arc<dyn Connector>,
    runtime: Handle,
    registry: SubscriptionRegistry,
    dispatcher: EventDispatcher,
    status: StatusBroadcaster,
    core: Mutex<ConnectionCore>,
}

/// Shared client for the backend's push channel.
///
/// Lifecycle: [`EventClient::new`] once at startup, [`EventClient::connect`]
/// from any consumer that needs live data (idempotent), and
/// [`EventClient::shutdown`] once when the application exits.
#[derive(Clone)]
pub struct EventClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventClient")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .field("reconnect", &self.reconnect_status())
            .finish_non_exhaustive()
    }
}

impl EventClient {
    /// Creates a client that connects through `connector`.
    ///
    /// Nothing is opened until [`EventClient::connect`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoRuntime`] when called outside a tokio
    /// runtime; the runtime is captured here and drives every socket and
    /// timer task.
    pub fn new(config: &ClientConfig, connector: Arc<dyn Connector>) -> Result<Self, ClientError> {
        let runtime = Handle::try_current().map_err(|e| ClientError::NoRuntime(e.to_string()))?;
        let registry = SubscriptionRegistry::new();
        let inner = Inner {
            url: config.ws_url.clone(),
            policy: ReconnectPolicy::from_config(config),
            keepalive: config.keepalive_interval,
            shutdown_timeout: config.shutdown_timeout,
            connector,
            runtime,
            dispatcher: EventDispatcher::new(registry.clone()),
            registry,
            status: StatusBroadcaster::new(),
            core: Mutex::new(ConnectionCore::default()),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Creates a client using the WebSocket connector.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoRuntime`] when called outside a tokio runtime.
    pub fn with_websocket(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(
            config,
            Arc::new(TungsteniteConnector::new(config.connect_timeout)),
        )
    }

    /// Opens the connection unless it is already open or opening.
    ///
    /// After reconnect exhaustion this also re-arms automatic recovery with
    /// a fresh attempt budget.
    pub fn connect(&self) {
        self.inner.open(OpenOrigin::Caller);
    }

    /// Closes the connection on the caller's behalf. Never reconnects
    /// automatically afterwards; call [`EventClient::connect`] to resume.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Final teardown: closes gracefully (bounded by the configured shutdown
    /// timeout), cancels timers, and turns later `connect` calls into no-ops.
    pub async fn shutdown(&self) {
        lock(&self.inner.core).shut_down = true;
        self.inner.close();

        let task = lock(&self.inner.core).socket_task.take();
        if let Some(mut task) = task {
            if tokio::time::timeout(self.inner.shutdown_timeout, &mut task)
                .await
                .is_err()
            {
                tracing::warn!("socket did not close in time; aborting");
                task.abort();
            }
        }

        let changed = {
            let mut core = lock(&self.inner.core);
            core.generation = core.generation.wrapping_add(1);
            core.outbound = None;
            let changed = core.state != ConnectionState::Closed;
            core.state = ConnectionState::Closed;
            changed
        };
        if changed {
            self.inner.announce(ConnectionState::Closed);
        }
        tracing::info!("event client shut down");
    }

    /// Serializes `data` as JSON and sends it if the connection is open.
    ///
    /// Returns `false` (and logs) when not connected or when `data` cannot
    /// be serialized. Fire-and-forget: `true` means the frame was queued.
    pub fn send<T: Serialize + ?Sized>(&self, data: &T) -> bool {
        let text = match serde_json::to_string(data) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "outbound message could not be serialized");
                return false;
            }
        };
        let core = lock(&self.inner.core);
        let sender = match (&core.state, &core.outbound) {
            (ConnectionState::Open, Some(sender)) => sender,
            (state, _) => {
                tracing::warn!(state = %state, "not connected; outbound message dropped");
                return false;
            }
        };
        if sender.send(Outbound::Frame(text)).is_err() {
            tracing::warn!("socket task gone; outbound message dropped");
            return false;
        }
        true
    }

    /// Subscribes `callback` to `event_type`. See [`SubscriptionRegistry::subscribe`].
    pub fn subscribe(&self, event_type: EventType, callback: EventCallback) -> Subscription {
        self.inner.registry.subscribe(event_type, callback)
    }

    /// Subscribes a closure to `event_type`.
    pub fn subscribe_fn<F>(&self, event_type: EventType, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe_fn(event_type, callback)
    }

    /// Removes `callback` from `event_type`. No-op if absent.
    pub fn unsubscribe(&self, event_type: &EventType, callback: &EventCallback) -> bool {
        self.inner.registry.unsubscribe(event_type, callback)
    }

    /// Registers a connectivity listener.
    pub fn on_status_change(&self, listener: StatusListener) -> StatusSubscription {
        self.inner.status.on_status_change(listener)
    }

    /// Removes a connectivity listener. No-op if absent.
    pub fn off_status_change(&self, listener: &StatusListener) -> bool {
        self.inner.status.off_status_change(listener)
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.core).state
    }

    /// Returns `true` while the connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Reconnect bookkeeping snapshot.
    #[must_use]
    pub fn reconnect_status(&self) -> ReconnectStatus {
        lock(&self.inner.core).reconnect.status()
    }

    /// Number of subscribers for `event_type`.
    #[must_use]
    pub fn subscriber_count(&self, event_type: &EventType) -> usize {
        self.inner.registry.count(event_type)
    }

    /// The dispatcher that routes this client's inbound frames.
    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    /// Spawns `future` on the runtime captured at construction.
    pub(crate) fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.runtime.spawn(future)
    }
}

impl Inner {
    fn announce(&self, state: ConnectionState) {
        self.status.broadcast(StatusEvent::StateChanged(state));
    }

    fn open(self: &Arc<Self>, origin: OpenOrigin) {
        let (generation, outbound) = {
            let mut core = lock(&self.core);
            if core.shut_down {
                tracing::debug!("connect ignored: client is shut down");
                return;
            }
            match origin {
                OpenOrigin::Retry(token) => {
                    if !core.reconnect.take_fired(token) {
                        return;
                    }
                }
                OpenOrigin::Caller => {
                    core.reconnect.cancel_pending();
                    if core.reconnect.is_exhausted() {
                        tracing::info!("manual connect after exhaustion; reconnect budget restored");
                        core.reconnect.reset();
                    }
                }
            }
            if core.state.is_active() {
                tracing::debug!(state = %core.state, "already open or connecting");
                return;
            }
            core.generation = core.generation.wrapping_add(1);
            let generation = core.generation;
            let (tx, rx) = mpsc::unbounded_channel();
            core.outbound = Some(tx);
            core.state = ConnectionState::Connecting;
            (generation, rx)
        };
        tracing::info!(url = %self.url, generation, "connecting");
        // Connecting must reach listeners before the socket task can announce Open.
        self.announce(ConnectionState::Connecting);

        let mut core = lock(&self.core);
        if core.shut_down
            || core.generation != generation
            || core.state != ConnectionState::Connecting
        {
            tracing::debug!(generation, "attempt superseded before the socket task started");
            return;
        }
        let weak = Arc::downgrade(self);
        core.socket_task = Some(self.runtime.spawn(run_socket(weak, generation, outbound)));
    }

    fn close(&self) {
        let announced = {
            let mut core = lock(&self.core);
            if core.reconnect.cancel_pending() {
                tracing::debug!("pending reconnect cancelled");
            }
            match core.state {
                ConnectionState::Open => {
                    core.state = ConnectionState::Closing;
                    if let Some(tx) = &core.outbound {
                        let _ = tx.send(Outbound::Close);
                    }
                    Some(ConnectionState::Closing)
                }
                ConnectionState::Connecting => {
                    if let Some(task) = core.socket_task.take() {
                        task.abort();
                    }
                    core.generation = core.generation.wrapping_add(1);
                    core.outbound = None;
                    core.state = ConnectionState::Closed;
                    Some(ConnectionState::Closed)
                }
                ConnectionState::Closing | ConnectionState::Closed => None,
            }
        };
        match announced {
            Some(state) => {
                tracing::info!(state = %state, "close requested");
                self.announce(state);
            }
            None => tracing::debug!("close ignored: not open"),
        }
    }

    /// Marks `generation` open. Returns `false` if that attempt is stale.
    fn handle_open(&self, generation: u64) -> bool {
        {
            let mut core = lock(&self.core);
            if core.generation != generation || core.state != ConnectionState::Connecting {
                return false;
            }
            core.state = ConnectionState::Open;
            core.reconnect.reset();
        }
        tracing::info!(url = %self.url, "connection open");
        self.announce(ConnectionState::Open);
        true
    }

    fn handle_close(self: &Arc<Self>, generation: u64, cause: CloseCause) {
        let (decision, exhausted_attempts) = {
            let mut core = lock(&self.core);
            if core.generation != generation {
                return;
            }
            core.outbound = None;
            core.socket_task = None;
            let requested = matches!(cause, CloseCause::Requested)
                || core.state == ConnectionState::Closing
                || core.shut_down;
            core.state = ConnectionState::Closed;

            if requested {
                (None, None)
            } else {
                match core.reconnect.next_retry(&self.policy) {
                    RetryDecision::Retry { attempt, delay } => {
                        let token = core.reconnect.next_token();
                        let weak = Arc::downgrade(self);
                        let handle = self.runtime.spawn(async move {
                            tokio::time::sleep(delay).await;
                            if let Some(inner) = weak.upgrade() {
                                inner.open(OpenOrigin::Retry(token));
                            }
                        });
                        core.reconnect.arm(PendingRetry { token, handle });
                        (Some((attempt, delay)), None)
                    }
                    RetryDecision::Exhausted { attempts } => (None, Some(attempts)),
                }
            }
        };

        match &cause {
            CloseCause::Requested => tracing::info!("connection closed by caller"),
            CloseCause::Remote => tracing::info!("connection closed by peer"),
            CloseCause::Failed(e) => tracing::warn!(error = %e, "connection failed"),
        }
        self.announce(ConnectionState::Closed);

        if let Some((attempt, delay)) = decision {
            tracing::info!(
                attempt,
                max_attempts = self.policy.max_attempts(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnect scheduled"
            );
        }
        if let Some(attempts) = exhausted_attempts {
            tracing::error!(attempts, "reconnect attempts exhausted; call connect() to retry");
            self.status.broadcast(StatusEvent::ReconnectExhausted { attempts });
        }
    }
}

/// Drives one socket from connect to close.
async fn run_socket(
    weak: Weak<Inner>,
    generation: u64,
    mut commands: mpsc::UnboundedReceiver<Outbound>,
) {
    let Some((connector, url, keepalive)) = weak
        .upgrade()
        .map(|inner| (Arc::clone(&inner.connector), inner.url.clone(), inner.keepalive))
    else {
        return;
    };

    let channels = match connector.connect(&url).await {
        Ok(channels) => channels,
        Err(e) => {
            if let Some(inner) = weak.upgrade() {
                inner.handle_close(generation, CloseCause::Failed(e));
            }
            return;
        }
    };

    match weak.upgrade() {
        Some(inner) if inner.handle_open(generation) => {}
        _ => return,
    }

    let cause = pump(&weak, channels, &mut commands, keepalive).await;
    if let Some(inner) = weak.upgrade() {
        inner.handle_close(generation, cause);
    }
}

/// Moves frames in both directions until the socket closes.
async fn pump(
    weak: &Weak<Inner>,
    channels: TransportChannels,
    commands: &mut mpsc::UnboundedReceiver<Outbound>,
    keepalive: Option<Duration>,
) -> CloseCause {
    let TransportChannels {
        mut inbound,
        mut outbound,
    } = channels;
    let mut keepalive = keepalive.map(|period| {
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    });

    loop {
        tokio::select! {
            // Frame from the backend
            frame = inbound.next() => {
                match frame {
                    Some(Ok(text)) => {
                        let Some(inner) = weak.upgrade() else {
                            return CloseCause::Requested;
                        };
                        inner.dispatcher.dispatch(&text);
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "transport error");
                        return CloseCause::Failed(e);
                    }
                    None => return CloseCause::Remote,
                }
            }
            // Command from the client handle
            command = commands.recv() => {
                match command {
                    Some(Outbound::Frame(text)) => {
                        if let Err(e) = outbound.send(text).await {
                            tracing::warn!(error = %e, "send failed");
                            return CloseCause::Failed(e);
                        }
                    }
                    Some(Outbound::Close) | None => {
                        if let Err(e) = outbound.close().await {
                            tracing::debug!(error = %e, "error while closing socket");
                        }
                        return CloseCause::Requested;
                    }
                }
            }
            // Keepalive ping
            () = tick(keepalive.as_mut()) => {
                let Ok(ping) = serde_json::to_string(&ClientMessage::Ping) else {
                    continue;
                };
                if let Err(e) = outbound.send(ping).await {
                    tracing::warn!(error = %e, "keepalive failed");
                    return CloseCause::Failed(e);
                }
                tracing::trace!("keepalive sent");
            }
        }
    }
}

async fn tick(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
