//! Polling backstop seam.

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::error::ClientError;

/// Something a view can poll for the authoritative trading status.
///
/// The push channel may miss updates while disconnected; polling this on an
/// interval keeps the view correct regardless.
pub trait StatusSource: Send + Sync + 'static {
    /// Fetches the current status snapshot.
    fn fetch_status(&self) -> BoxFuture<'static, Result<Value, ClientError>>;
}
