//! Shared application context handed to every view.

use std::fmt;
use std::sync::Arc;

use crate::service::StatusSource;
use crate::ws::EventClient;

/// The long-lived collaborators every view binds against.
///
/// Built once at startup. Cloning shares the same client and status source.
#[derive(Clone)]
pub struct AppContext {
    /// The shared push-channel client.
    pub client: EventClient,
    /// Source polled by views as a correctness backstop.
    pub status_source: Arc<dyn StatusSource>,
}

impl AppContext {
    /// Bundles `client` and `status_source`.
    #[must_use]
    pub fn new(client: EventClient, status_source: Arc<dyn StatusSource>) -> Self {
        Self {
            client,
            status_source,
        }
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppContext")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
