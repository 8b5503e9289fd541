//! # trading-feed-client
//!
//! Real-time event client for an automated trading dashboard.
//!
//! One shared WebSocket connection per process carries push events from the
//! trading backend (market updates, positions, analysis results, scheduled
//! jobs, liquidations). Views subscribe to the event types they render and
//! poll the REST status endpoint as a backstop. Dropped connections are
//! retried with exponential backoff.
//!
//! ## Architecture
//!
//! ```text
//! Backend (/ws, /api)
//!     │
//!     ├── EventClient (ws/)        one socket, state machine, reconnect
//!     │     └── EventDispatcher    decode frame → route by type
//!     ├── RestClient (api/)        status polling, trading commands
//!     │
//!     ├── SubscriptionRegistry     (domain/)
//!     ├── StatusBroadcaster        (domain/)
//!     │
//!     └── ViewBinding (service/)   per-view subscriptions + poller
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
