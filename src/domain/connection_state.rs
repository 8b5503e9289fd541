//! Connection state and the status events derived from it.

use std::fmt;

/// State of the push connection. Exactly one value at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// A connection attempt is in flight.
    Connecting,
    /// The socket is open and frames flow.
    Open,
    /// A caller-requested close is in progress.
    Closing,
    /// No socket.
    #[default]
    Closed,
}

impl ConnectionState {
    /// Returns `true` if a socket exists or is being established.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What status listeners receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// The connection moved to a new state.
    StateChanged(ConnectionState),
    /// Automatic reconnection gave up; a manual `connect()` is required.
    ReconnectExhausted {
        /// Number of retries that were made.
        attempts: u32,
    },
}

impl StatusEvent {
    /// The new state, if this event is a state transition.
    #[must_use]
    pub const fn state(self) -> Option<ConnectionState> {
        match self {
            Self::StateChanged(state) => Some(state),
            Self::ReconnectExhausted { .. } => None,
        }
    }
}
