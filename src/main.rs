//! trading-feed-client entry point.
//!
//! Connects to the backend, mounts the dashboard view, and logs what it
//! receives until interrupted.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use trading_feed_client::api::RestClient;
use trading_feed_client::app_state::AppContext;
use trading_feed_client::config::ClientConfig;
use trading_feed_client::domain::{Event, EventType, StatusEvent};
use trading_feed_client::service::{ViewBinding, ViewSpec};
use trading_feed_client::ws::EventClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load configuration
    let config = ClientConfig::from_env()?;
    tracing::info!(ws_url = %config.ws_url, api = %config.api_base_url, "starting trading-feed-client");

    // Build collaborators
    let rest = RestClient::new(&config)?;
    let client = EventClient::with_websocket(&config)?;
    let context = AppContext::new(client.clone(), Arc::new(rest));

    let _status_log = client.on_status_change(Arc::new(|status: &StatusEvent| match status {
        StatusEvent::StateChanged(state) => tracing::info!(state = %state, "connection state"),
        StatusEvent::ReconnectExhausted { attempts } => {
            tracing::error!(attempts, "backend unreachable; live updates stopped");
        }
    }));
    let _liquidations = client.subscribe_fn(EventType::LiquidationDetected, |event: &Event| {
        tracing::warn!(data = %event.data(), "liquidation detected");
    });

    // Mount the dashboard
    let dashboard = ViewBinding::mount(
        &context,
        ViewSpec::dashboard().with_poll_interval(config.status_poll_interval),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");

    let snapshot = dashboard.snapshot();
    tracing::info!(
        event_types = snapshot.event_type_count(),
        last_polled_at = ?snapshot.last_polled_at(),
        "final dashboard state"
    );
    dashboard.unmount();
    client.shutdown().await;

    Ok(())
}
