//! Backend-pushed events.
//!
//! Every inbound frame that survives decoding becomes an [`Event`] tagged
//! with an [`EventType`]. Events are immutable and live for one dispatch
//! pass; subscribers that want to keep one clone it.

use std::fmt;

use serde::de::DeserializeOwned;

/// Event type tag.
///
/// Known tags are matched case-insensitively, so the backend's
/// `"trading_status"` and `"TRADING_STATUS"` map to the same variant.
/// Anything else is carried as [`EventType::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Real-time market snapshot.
    MarketUpdate,
    /// Position snapshot.
    PositionUpdate,
    /// A position was liquidated or force-closed by the exchange.
    LiquidationDetected,
    /// Result of a scheduled trading analysis.
    AnalysisResult,
    /// Trading-status snapshot.
    TradingStatus,
    /// Map of scheduled backend jobs.
    ScheduledJobs,
    /// Result of a one-off analysis that does not trade.
    AnalysisOnlyResult,
    /// Greeting sent by the backend right after the socket opens.
    ConnectionEstablished,
    /// A position was closed because its expected holding time elapsed.
    ForceClose,
    /// Reply to a keepalive ping.
    Pong,
    /// Any tag this client does not know about.
    Custom(String),
}

impl EventType {
    /// Event types a full dashboard view subscribes to.
    pub const DASHBOARD: [Self; 7] = [
        Self::MarketUpdate,
        Self::PositionUpdate,
        Self::LiquidationDetected,
        Self::AnalysisResult,
        Self::TradingStatus,
        Self::ScheduledJobs,
        Self::AnalysisOnlyResult,
    ];

    /// Resolves a wire tag to a known variant, or `None` if unrecognised.
    #[must_use]
    pub fn known(tag: &str) -> Option<Self> {
        let event_type = match tag.trim().to_ascii_uppercase().as_str() {
            "MARKET_UPDATE" => Self::MarketUpdate,
            "POSITION_UPDATE" => Self::PositionUpdate,
            "LIQUIDATION_DETECTED" | "LIQUIDATION" => Self::LiquidationDetected,
            "ANALYSIS_RESULT" => Self::AnalysisResult,
            "TRADING_STATUS" => Self::TradingStatus,
            "SCHEDULED_JOBS" => Self::ScheduledJobs,
            "ANALYSIS_ONLY_RESULT" => Self::AnalysisOnlyResult,
            "CONNECTION_ESTABLISHED" => Self::ConnectionEstablished,
            "FORCE_CLOSE" => Self::ForceClose,
            "PONG" => Self::Pong,
            _ => return None,
        };
        Some(event_type)
    }

    /// Resolves a wire tag, falling back to [`EventType::Custom`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        Self::known(tag).unwrap_or_else(|| Self::Custom(tag.to_string()))
    }

    /// Returns the canonical wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::MarketUpdate => "MARKET_UPDATE",
            Self::PositionUpdate => "POSITION_UPDATE",
            Self::LiquidationDetected => "LIQUIDATION_DETECTED",
            Self::AnalysisResult => "ANALYSIS_RESULT",
            Self::TradingStatus => "TRADING_STATUS",
            Self::ScheduledJobs => "SCHEDULED_JOBS",
            Self::AnalysisOnlyResult => "ANALYSIS_ONLY_RESULT",
            Self::ConnectionEstablished => "CONNECTION_ESTABLISHED",
            Self::ForceClose => "FORCE_CLOSE",
            Self::Pong => "PONG",
            Self::Custom(tag) => tag.as_str(),
        }
    }

    /// Whether the `data` payload of this type must be a JSON object.
    ///
    /// Custom tags are passed through unchecked.
    #[must_use]
    pub const fn requires_object_payload(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: EventType,
    data: serde_json::Value,
    timestamp: Option<String>,
    frame: serde_json::Value,
}

impl Event {
    /// Builds an event from its parts. `frame` is the full parsed wire object.
    #[must_use]
    pub const fn new(
        event_type: EventType,
        data: serde_json::Value,
        timestamp: Option<String>,
        frame: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            data,
            timestamp,
            frame,
        }
    }

    /// The event's type tag.
    #[must_use]
    pub const fn event_type(&self) -> &EventType {
        &self.event_type
    }

    /// The event payload (`null` when the frame carried none).
    #[must_use]
    pub const fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Backend timestamp, verbatim, if the frame had one.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    /// The full parsed frame, including fields this client ignores.
    #[must_use]
    pub const fn frame(&self) -> &serde_json::Value {
        &self.frame
    }

    /// Deserializes the payload into a caller-chosen shape.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the payload does not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}
