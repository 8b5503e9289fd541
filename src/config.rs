//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), each with a default matching the
//! dashboard's stock deployment.

use std::time::Duration;

use crate::error::ClientError;

/// Default push endpoint.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8000/ws";

/// Default REST base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Base delay of the reconnect backoff.
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Maximum number of automatic reconnect attempts after consecutive failures.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Default jitter fraction applied to reconnect delays.
pub const DEFAULT_RECONNECT_JITTER: f64 = 0.1;

/// Top-level client configuration.
///
/// Loaded once at startup via [`ClientConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Push endpoint (e.g. `ws://localhost:8000/ws`).
    pub ws_url: String,

    /// Base URL of the REST backend (e.g. `http://localhost:8000`).
    pub api_base_url: String,

    /// Delay before the first reconnect attempt; doubles per attempt.
    pub reconnect_base_delay: Duration,

    /// Maximum number of automatic reconnect attempts.
    pub reconnect_max_attempts: u32,

    /// Symmetric jitter fraction in `[0, 1]` applied to each delay.
    pub reconnect_jitter: f64,

    /// Upper bound on a single connection attempt.
    pub connect_timeout: Duration,

    /// Interval between keepalive pings; `None` disables them.
    pub keepalive_interval: Option<Duration>,

    /// Interval of each view's REST status backstop.
    pub status_poll_interval: Duration,

    /// Timeout of a single REST request.
    pub request_timeout: Duration,

    /// How long `shutdown` waits for a graceful close.
    pub shutdown_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
            reconnect_max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_jitter: DEFAULT_RECONNECT_JITTER,
            connect_timeout: Duration::from_secs(30),
            keepalive_interval: Some(Duration::from_secs(30)),
            status_poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(180),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file, then
    /// delegates to [`ClientConfig::from_lookup`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if `WS_URL` is set but is not a
    /// `ws://` or `wss://` URL.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Missing or unparsable numeric values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the push endpoint has a scheme
    /// other than `ws://` or `wss://`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let ws_url = lookup("WS_URL").unwrap_or(defaults.ws_url);
        if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
            return Err(ClientError::Config(format!(
                "WS_URL must start with ws:// or wss://, got {ws_url}"
            )));
        }

        let api_base_url = lookup("API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let base_delay_ms = parse_or(&lookup, "RECONNECT_BASE_DELAY_MS", 1000_u64);
        let reconnect_max_attempts = parse_or(
            &lookup,
            "RECONNECT_MAX_ATTEMPTS",
            DEFAULT_MAX_RECONNECT_ATTEMPTS,
        );
        let reconnect_jitter =
            parse_or(&lookup, "RECONNECT_JITTER", DEFAULT_RECONNECT_JITTER).clamp(0.0, 1.0);
        let connect_timeout_secs = parse_or(&lookup, "CONNECT_TIMEOUT_SECS", 30_u64);
        let keepalive_secs = parse_or(&lookup, "KEEPALIVE_INTERVAL_SECS", 30_u64);
        let poll_secs = parse_or(&lookup, "STATUS_POLL_INTERVAL_SECS", 5_u64);
        let request_timeout_secs = parse_or(&lookup, "API_TIMEOUT_SECS", 180_u64);
        let shutdown_timeout_secs = parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 5_u64);

        Ok(Self {
            ws_url,
            api_base_url,
            reconnect_base_delay: Duration::from_millis(base_delay_ms),
            reconnect_max_attempts,
            reconnect_jitter,
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            keepalive_interval: (keepalive_secs > 0).then(|| Duration::from_secs(keepalive_secs)),
            status_poll_interval: Duration::from_secs(poll_secs.max(1)),
            request_timeout: Duration::from_secs(request_timeout_secs),
            shutdown_timeout: Duration::from_secs(shutdown_timeout_secs),
        })
    }
}

/// Parses `key` as `T`, returning `default` on missing or invalid values.
fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        let Ok(config) = ClientConfig::from_lookup(|_| None) else {
            panic!("defaults must be valid");
        };
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.reconnect_base_delay, Duration::from_millis(1000));
        assert_eq!(config.reconnect_max_attempts, 10);
    }

    #[test]
    fn overrides_are_applied() {
        let lookup = lookup_from(&[
            ("WS_URL", "wss://feed.example.com/ws"),
            ("API_BASE_URL", "https://api.example.com/"),
            ("RECONNECT_BASE_DELAY_MS", "250"),
            ("RECONNECT_MAX_ATTEMPTS", "3"),
            ("KEEPALIVE_INTERVAL_SECS", "0"),
        ]);
        let Ok(config) = ClientConfig::from_lookup(lookup) else {
            panic!("config should parse");
        };
        assert_eq!(config.ws_url, "wss://feed.example.com/ws");
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.reconnect_base_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect_max_attempts, 3);
        assert_eq!(config.keepalive_interval, None);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let lookup = lookup_from(&[
            ("RECONNECT_MAX_ATTEMPTS", "many"),
            ("RECONNECT_JITTER", "7.5"),
        ]);
        let Ok(config) = ClientConfig::from_lookup(lookup) else {
            panic!("config should parse");
        };
        assert_eq!(config.reconnect_max_attempts, DEFAULT_MAX_RECONNECT_ATTEMPTS);
        assert!((config.reconnect_jitter - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn http_scheme_for_push_endpoint_is_rejected() {
        let lookup = lookup_from(&[("WS_URL", "http://localhost:8000/ws")]);
        let result = ClientConfig::from_lookup(lookup);
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
