//! Push-channel layer: the shared connection, frame routing, and recovery.
//!
//! [`EventClient`] owns the single socket to the backend's `/ws` endpoint.
//! Inbound frames go through the [`EventDispatcher`] to the subscribers
//! registered on the client; dropped connections are retried according to
//! the [`ReconnectPolicy`].

pub mod connection;
pub mod dispatcher;
pub mod messages;
pub mod reconnect;
pub mod transport;

pub use connection::EventClient;
pub use dispatcher::{DispatchOutcome, EventDispatcher};
pub use messages::{ClientMessage, decode_frame};
pub use reconnect::{ReconnectPolicy, ReconnectStatus, RetryDecision};
pub use transport::{Connector, InboundFrames, OutboundFrames, TransportChannels, TungsteniteConnector};
