//! Trading status DTOs for `GET /api/trading/status`.
//!
//! The status endpoint reports prices and position figures either as JSON
//! numbers or as numeric strings, depending on which exchange call produced
//! them. Both forms deserialize to `f64` here.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Snapshot returned by the trading status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingStatus {
    /// `"running"`, `"not_started"`, or `"error"`.
    #[serde(default)]
    pub status: String,
    /// ISO-8601 time of the next scheduled analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_analysis: Option<String>,
    /// Open position, if any.
    #[serde(default)]
    pub current_position: Option<PositionSnapshot>,
    /// Last traded price.
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_price: Option<f64>,
    /// Side of the most recently held position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_position_side: Option<String>,
    /// Set when the backend noticed the position was liquidated.
    #[serde(default)]
    pub liquidation_detected: bool,
    /// Why the liquidation was detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidation_reason: Option<String>,
    /// Price at which the liquidation was detected.
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub liquidation_price: Option<f64>,
    /// Any other fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Open position as reported by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// `"long"`, `"short"`, or `"none"`.
    #[serde(default)]
    pub side: String,
    /// Contract size.
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub size: Option<f64>,
    /// Average entry price.
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub entry_price: Option<f64>,
    /// Unrealized profit and loss.
    #[serde(
        default,
        deserialize_with = "lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub unrealized_pnl: Option<f64>,
    /// Any other fields (leverage, ROE targets, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PositionSnapshot {
    /// Returns `true` when the snapshot describes an actual open position.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.side != "none" && self.size.is_some_and(|size| size != 0.0)
    }
}

/// Accepts a number, a numeric string, or null. Anything unparseable is `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(text)) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        Some(Raw::Other(_)) | None => None,
    })
}
