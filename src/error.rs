//! Client error types.
//!
//! [`ClientError`] is the central error type for fallible setup and REST
//! calls. [`DecodeError`] describes why an inbound push frame was dropped.
//! Neither crosses the push subsystem's public boundary: transport and
//! decode failures are logged and turned into state changes instead.

/// Client-side error enum.
///
/// # Categories
///
/// | Variant           | Raised by                         | Retryable |
/// |-------------------|-----------------------------------|-----------|
/// | `Transport`       | connector, socket read/write      | yes       |
/// | `ConnectionClosed`| socket sink after the peer left   | yes       |
/// | `NoRuntime`       | `EventClient::new` outside tokio  | no        |
/// | `Config`          | `ClientConfig::from_env`          | no        |
/// | `Http`            | `RestClient` transport            | yes       |
/// | `Api`             | `RestClient` non-success response | no        |
/// | `Serialization`   | JSON encode/decode                | no        |
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Socket-level failure: refused, timed out, reset.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection went away while a frame was being written.
    #[error("connection closed")]
    ConnectionClosed,

    /// No tokio runtime was available to drive the connection.
    #[error("no async runtime available: {0}")]
    NoRuntime(String),

    /// Configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// HTTP transport failure from the REST collaborator.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered, but reported failure.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Message reported by the backend, if any.
        message: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns `true` when retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::ConnectionClosed | Self::Http(_) => true,
            Self::NoRuntime(_) | Self::Config(_) | Self::Api { .. } | Self::Serialization(_) => {
                false
            }
        }
    }
}

/// Why an inbound frame could not be turned into an [`Event`](crate::domain::Event).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame is valid JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// Neither `type` nor `event_type` carries a string tag.
    #[error("frame has no `type` or `event_type` field")]
    MissingType,

    /// The payload does not have the shape its event type requires.
    #[error("{event_type} payload must be an object, found {found}")]
    PayloadShape {
        /// Canonical name of the event type.
        event_type: String,
        /// JSON kind actually found in `data`.
        found: &'static str,
    },
}

impl DecodeError {
    /// Short machine-friendly reason, used as a log field.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::NotAnObject => "not_an_object",
            Self::MissingType => "missing_type",
            Self::PayloadShape { .. } => "payload_shape",
        }
    }
}
