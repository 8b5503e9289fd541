//! Transport seam between the connection state machine and the socket.
//!
//! A [`Connector`] opens one socket and hands back its two halves as a
//! stream of inbound text frames and a sink of outbound text frames. The
//! inbound stream ending means the peer closed; an `Err` item is a
//! transport error, after which the connection treats the socket as closed.

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use futures_util::future::{self, BoxFuture};
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::error::ClientError;

/// Inbound half: text frames as received, in order.
pub type InboundFrames = BoxStream<'static, Result<String, ClientError>>;

/// Outbound half: text frames to transmit. Closing the sink closes the socket.
pub type OutboundFrames = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;

/// An established socket, split into its two halves.
pub struct TransportChannels {
    /// Frames from the peer.
    pub inbound: InboundFrames,
    /// Frames to the peer.
    pub outbound: OutboundFrames,
}

impl fmt::Debug for TransportChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportChannels").finish_non_exhaustive()
    }
}

/// Opens sockets on behalf of the event client.
pub trait Connector: Send + Sync + 'static {
    /// Opens a socket to `url`. Resolves once the socket is usable.
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<TransportChannels, ClientError>>;
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    /// Creates a connector that gives up on an attempt after `connect_timeout`.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Connector for TungsteniteConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<TransportChannels, ClientError>> {
        let url = url.to_string();
        let connect_timeout = self.connect_timeout;
        Box::pin(async move {
            let (stream, _response) =
                tokio::time::timeout(connect_timeout, connect_async(url.as_str()))
                    .await
                    .map_err(|_| ClientError::Transport("connection timeout".to_string()))?
                    .map_err(|e| ClientError::Transport(e.to_string()))?;

            let (write, read) = stream.split();

            let inbound = read
                .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
                .filter_map(|msg| {
                    future::ready(match msg {
                        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => Some(Ok(text)),
                            Err(_) => {
                                tracing::debug!(len = bytes.len(), "ignoring non-utf8 binary frame");
                                None
                            }
                        },
                        Ok(_) => None,
                        Err(e) => Some(Err(ClientError::Transport(e.to_string()))),
                    })
                })
                .boxed();

            let outbound = write
                .with(|text: String| future::ready(Ok::<_, tungstenite::Error>(Message::text(text))))
                .sink_map_err(|e| ClientError::Transport(e.to_string()));

            Ok(TransportChannels {
                inbound,
                outbound: Box::pin(outbound),
            })
        })
    }
}
