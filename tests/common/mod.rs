//! Shared harness: a scripted in-memory connector and status helpers.

#![allow(dead_code, clippy::panic)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{StreamExt, sink, stream};
use tokio::sync::mpsc;
use tokio::time::Instant;

use trading_feed_client::config::ClientConfig;
use trading_feed_client::domain::{ConnectionState, StatusEvent, StatusSubscription};
use trading_feed_client::error::ClientError;
use trading_feed_client::ws::{Connector, EventClient, TransportChannels};

/// How the connector answers one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Refuse,
    Accept,
    /// Never completes.
    Hang,
}

/// Server side of one accepted connection.
#[derive(Debug)]
pub struct Peer {
    /// Frames to deliver to the client. Dropping it closes the connection.
    pub to_client: mpsc::UnboundedSender<Result<String, ClientError>>,
    /// Frames the client sent.
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl Peer {
    pub fn push(&self, frame: &str) {
        if self.to_client.send(Ok(frame.to_string())).is_err() {
            panic!("client side of the connection is gone");
        }
    }
}

#[derive(Debug)]
struct Script {
    plan: VecDeque<Attempt>,
    fallback: Attempt,
    attempts: Vec<Instant>,
    greeting: Option<String>,
}

/// Connector whose attempts follow a script.
#[derive(Debug, Clone)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
    peers: mpsc::UnboundedSender<Peer>,
}

impl ScriptedConnector {
    /// Attempts follow `plan`, then `fallback` forever. Accepted connections
    /// are handed out through the returned receiver.
    pub fn new(plan: &[Attempt], fallback: Attempt) -> (Self, mpsc::UnboundedReceiver<Peer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Arc::new(Mutex::new(Script {
                plan: plan.iter().copied().collect(),
                fallback,
                attempts: Vec::new(),
                greeting: None,
            })),
            peers,
        };
        (connector, peers_rx)
    }

    /// Every accepted connection starts with `frame` already queued, the way
    /// the backend greets a fresh socket.
    pub fn with_greeting(self, frame: &str) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.greeting = Some(frame.to_string());
        }
        self
    }

    /// Times at which each attempt was made.
    pub fn attempts(&self) -> Vec<Instant> {
        self.script
            .lock()
            .map(|script| script.attempts.clone())
            .unwrap_or_default()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts().len()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _url: &str) -> BoxFuture<'static, Result<TransportChannels, ClientError>> {
        let script = Arc::clone(&self.script);
        let peers = self.peers.clone();
        Box::pin(async move {
            let (attempt, greeting) = {
                let Ok(mut script) = script.lock() else {
                    panic!("script lock poisoned");
                };
                script.attempts.push(Instant::now());
                let fallback = script.fallback;
                let attempt = script.plan.pop_front().unwrap_or(fallback);
                (attempt, script.greeting.clone())
            };
            match attempt {
                Attempt::Refuse => {
                    return Err(ClientError::Transport("connection refused".to_string()));
                }
                Attempt::Hang => std::future::pending::<()>().await,
                Attempt::Accept => {}
            }

            let (to_client, inbound_rx) = mpsc::unbounded_channel();
            let (outbound_tx, from_client) = mpsc::unbounded_channel();
            if let Some(greeting) = greeting {
                let _ = to_client.send(Ok(greeting));
            }
            let inbound = stream::unfold(inbound_rx, |mut rx| async move {
                rx.recv().await.map(|frame| (frame, rx))
            })
            .boxed();
            let outbound = sink::unfold(outbound_tx, |tx, frame: String| async move {
                tx.send(frame).map_err(|_| ClientError::ConnectionClosed)?;
                Ok::<_, ClientError>(tx)
            });
            let _ = peers.send(Peer {
                to_client,
                from_client,
            });
            Ok(TransportChannels {
                inbound,
                outbound: Box::pin(outbound),
            })
        })
    }
}

/// Deterministic configuration: no jitter, no keepalive.
pub fn test_config() -> ClientConfig {
    ClientConfig {
        reconnect_jitter: 0.0,
        keepalive_interval: None,
        ..ClientConfig::default()
    }
}

pub fn client_with(config: &ClientConfig, connector: &ScriptedConnector) -> EventClient {
    let Ok(client) = EventClient::new(config, Arc::new(connector.clone())) else {
        panic!("client should build inside a runtime");
    };
    client
}

/// Records every status event the client broadcasts.
#[derive(Debug)]
pub struct StatusProbe {
    events: mpsc::UnboundedReceiver<StatusEvent>,
    _subscription: StatusSubscription,
}

impl StatusProbe {
    pub fn attach(client: &EventClient) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let subscription = client.on_status_change(Arc::new(move |event: &StatusEvent| {
            let _ = tx.send(event.clone());
        }));
        Self {
            events,
            _subscription: subscription,
        }
    }

    /// Next status event, failing the test after an hour of virtual time.
    pub async fn next(&mut self) -> StatusEvent {
        match tokio::time::timeout(Duration::from_secs(3600), self.events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => panic!("status channel closed"),
            Err(_) => panic!("no status event arrived"),
        }
    }

    /// Skips events until `state` is reported. Returns the skipped events.
    pub async fn wait_for(&mut self, state: ConnectionState) -> Vec<StatusEvent> {
        let mut seen = Vec::new();
        loop {
            let event = self.next().await;
            if event.state() == Some(state) {
                return seen;
            }
            seen.push(event);
        }
    }

    /// Skips events until reconnection gives up. Returns the attempt count.
    pub async fn wait_for_exhaustion(&mut self) -> u32 {
        loop {
            if let StatusEvent::ReconnectExhausted { attempts } = self.next().await {
                return attempts;
            }
        }
    }

    /// Drains everything already delivered.
    pub fn drain(&mut self) -> Vec<StatusEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<Peer>) -> Peer {
    match tokio::time::timeout(Duration::from_secs(3600), peers.recv()).await {
        Ok(Some(peer)) => peer,
        _ => panic!("no connection was accepted"),
    }
}

/// Lets spawned tasks run without advancing the clock meaningfully.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
