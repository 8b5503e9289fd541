//! End-to-end tests against an in-process axum backend: the tungstenite
//! connector over a real socket, and the REST client over real HTTP.

#![allow(clippy::panic)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use trading_feed_client::api::RestClient;
use trading_feed_client::config::ClientConfig;
use trading_feed_client::domain::{ConnectionState, Event, EventType, StatusEvent};
use trading_feed_client::error::ClientError;
use trading_feed_client::service::StatusSource;
use trading_feed_client::ws::{Connector, EventClient, TungsteniteConnector};

const WAIT: Duration = Duration::from_secs(5);

fn frame(event_type: &str, data: Value) -> Message {
    Message::Text(
        json!({
            "type": event_type.to_ascii_lowercase(),
            "event_type": event_type,
            "data": data,
            "timestamp": "2025-03-01T10:00:00"
        })
        .to_string()
        .into(),
    )
}

async fn ws_handler(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(serve_socket)
}

async fn serve_socket(mut socket: WebSocket) {
    let greeting = frame("CONNECTION_ESTABLISHED", json!({"message": "connected"}));
    let market = frame("MARKET_UPDATE", json!({"price": 65000.5}));
    if socket.send(greeting).await.is_err() || socket.send(market).await.is_err() {
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let reply = match request.get("type").and_then(Value::as_str) {
            Some("ping") => frame("PONG", json!({})),
            Some("echo") => Message::Text(
                json!({"type": "echo_reply", "data": request.get("data")})
                    .to_string()
                    .into(),
            ),
            _ => continue,
        };
        if socket.send(reply).await.is_err() {
            return;
        }
    }
}

async fn kick_handler(State(kicks): State<Arc<AtomicUsize>>, ws: WebSocketUpgrade) -> Response {
    kicks.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(|mut socket: WebSocket| async move {
        let _ = socket
            .send(frame("CONNECTION_ESTABLISHED", json!({})))
            .await;
        let _ = socket.send(Message::Close(None)).await;
    })
}

async fn trading_status() -> Json<Value> {
    Json(json!({
        "status": "running",
        "next_analysis": "2025-03-01T11:00:00",
        "current_price": "65000.5",
        "current_position": {
            "side": "long",
            "size": "0.01",
            "entry_price": "64000",
            "unrealized_pnl": "10.05",
            "leverage": 5
        }
    }))
}

async fn trading_history(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let limit = params.get("limit").cloned().unwrap_or_default();
    Json(json!({"success": true, "data": [{"limit": limit}]}))
}

async fn start_trading() -> Json<Value> {
    Json(json!({"success": false, "message": "Failed to start trading"}))
}

async fn stop_trading() -> Json<Value> {
    Json(json!({"success": true, "message": "trading stopped"}))
}

async fn trading_data() -> (StatusCode, &'static str) {
    (StatusCode::BAD_GATEWAY, "upstream unavailable")
}

async fn get_model() -> Json<Value> {
    Json(json!({
        "success": true,
        "current_model": "gpt",
        "available_models": ["gpt", "claude", "claude-opus", "claude-opus-4.1"]
    }))
}

async fn set_model(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body.get("model").and_then(Value::as_str) {
        Some(model @ ("gpt" | "claude")) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("model set to {}", model.to_ascii_uppercase()),
                "current_model": model
            })),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "unsupported model"})),
        ),
    }
}

struct Backend {
    addr: SocketAddr,
    kicks: Arc<AtomicUsize>,
}

async fn spawn_backend() -> Backend {
    let kicks = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/ws/kick", get(kick_handler))
        .route("/api/trading/status", get(trading_status))
        .route("/api/trading/history", get(trading_history))
        .route("/api/trading/data", get(trading_data))
        .route("/api/trading/start", axum::routing::post(start_trading))
        .route("/api/trading/stop", axum::routing::post(stop_trading))
        .route("/api/ai/model", get(get_model).post(set_model))
        .with_state(Arc::clone(&kicks));

    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("failed to bind test listener");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener has no address");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Backend { addr, kicks }
}

fn config_for(backend: &Backend, path: &str) -> ClientConfig {
    ClientConfig {
        ws_url: format!("ws://{}{path}", backend.addr),
        api_base_url: format!("http://{}", backend.addr),
        reconnect_base_delay: Duration::from_millis(20),
        reconnect_jitter: 0.0,
        connect_timeout: Duration::from_secs(2),
        keepalive_interval: Some(Duration::from_millis(100)),
        ..ClientConfig::default()
    }
}

fn rest_client(backend: &Backend) -> RestClient {
    tokio_test::assert_ok!(RestClient::new(&config_for(backend, "/ws")))
}

#[tokio::test]
async fn websocket_session_delivers_events_both_ways() {
    let backend = spawn_backend().await;
    let client = tokio_test::assert_ok!(EventClient::with_websocket(&config_for(&backend, "/ws")));

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let mut subscriptions = Vec::new();
    for event_type in [
        EventType::ConnectionEstablished,
        EventType::MarketUpdate,
        EventType::Pong,
        EventType::Custom("echo_reply".to_string()),
    ] {
        let tx = tx.clone();
        subscriptions.push(client.subscribe_fn(event_type, move |event: &Event| {
            let _ = tx.send(event.clone());
        }));
    }

    client.connect();
    let mut seen = HashSet::new();
    while !(seen.contains(&EventType::ConnectionEstablished)
        && seen.contains(&EventType::MarketUpdate)
        && seen.contains(&EventType::Pong))
    {
        let Ok(Some(event)) = tokio::time::timeout(WAIT, rx.recv()).await else {
            panic!("missing events; saw {seen:?}");
        };
        if event.event_type() == &EventType::MarketUpdate {
            assert_eq!(event.data(), &json!({"price": 65000.5}));
            assert_eq!(event.timestamp(), Some("2025-03-01T10:00:00"));
        }
        seen.insert(event.event_type().clone());
    }
    assert!(client.is_connected());

    assert!(client.send(&json!({"type": "echo", "data": {"n": 1}})));
    loop {
        let Ok(Some(event)) = tokio::time::timeout(WAIT, rx.recv()).await else {
            panic!("echo reply did not arrive");
        };
        if event.event_type() == &EventType::Custom("echo_reply".to_string()) {
            assert_eq!(event.data(), &json!({"n": 1}));
            break;
        }
    }

    client.shutdown().await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn server_close_triggers_reconnect() {
    let backend = spawn_backend().await;
    let client =
        tokio_test::assert_ok!(EventClient::with_websocket(&config_for(&backend, "/ws/kick")));

    let (tx, mut rx) = mpsc::unbounded_channel::<StatusEvent>();
    let _status = client.on_status_change(Arc::new(move |event: &StatusEvent| {
        let _ = tx.send(*event);
    }));

    client.connect();
    let mut opens = 0;
    while opens < 3 {
        let Ok(Some(event)) = tokio::time::timeout(WAIT, rx.recv()).await else {
            panic!("connection was not re-established");
        };
        if event == StatusEvent::StateChanged(ConnectionState::Open) {
            opens += 1;
        }
    }
    assert!(backend.kicks.load(Ordering::SeqCst) >= 3);
    client.shutdown().await;
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("failed to bind");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("listener has no address");
    };
    drop(listener);

    let connector = TungsteniteConnector::new(Duration::from_secs(2));
    let result = connector.connect(&format!("ws://{addr}/ws")).await;
    let Err(ClientError::Transport(_)) = result else {
        panic!("expected transport error");
    };
}

#[tokio::test]
async fn trading_status_coerces_numeric_strings() {
    let backend = spawn_backend().await;
    let rest = rest_client(&backend);

    let status = tokio_test::assert_ok!(rest.trading_status().await);
    assert_eq!(status.status, "running");
    assert_eq!(status.current_price, Some(65000.5));
    let Some(position) = status.current_position else {
        panic!("position expected");
    };
    assert_eq!(position.size, Some(0.01));
    assert_eq!(position.entry_price, Some(64000.0));
    assert_eq!(position.unrealized_pnl, Some(10.05));
    assert!(position.is_open());

    let polled = tokio_test::assert_ok!(rest.fetch_status().await);
    assert_eq!(polled["current_price"], json!(65000.5));
    assert_eq!(polled["current_position"]["leverage"], json!(5));
}

#[tokio::test]
async fn history_limit_defaults_to_fifty() {
    let backend = spawn_backend().await;
    let rest = rest_client(&backend);

    let history = tokio_test::assert_ok!(rest.trading_history(None).await);
    assert_eq!(history, json!([{"limit": "50"}]));
    let history = tokio_test::assert_ok!(rest.trading_history(Some(5)).await);
    assert_eq!(history, json!([{"limit": "5"}]));
}

#[tokio::test]
async fn unsuccessful_responses_become_api_errors() {
    let backend = spawn_backend().await;
    let rest = rest_client(&backend);

    let Err(ClientError::Api { status, message }) = rest.start_trading().await else {
        panic!("start should fail");
    };
    assert_eq!(status, 200);
    assert_eq!(message, "Failed to start trading");

    let Err(ClientError::Api { status, message }) = rest.trading_data().await else {
        panic!("data should fail");
    };
    assert_eq!(status, 502);
    assert_eq!(message, "upstream unavailable");

    let stopped = tokio_test::assert_ok!(rest.stop_trading().await);
    assert_eq!(stopped["message"], json!("trading stopped"));
}

#[tokio::test]
async fn ai_model_selection() {
    let backend = spawn_backend().await;
    let rest = rest_client(&backend);

    let info = tokio_test::assert_ok!(rest.ai_model().await);
    assert_eq!(info.current_model, "gpt");
    assert_eq!(info.available_models.len(), 4);

    let changed = tokio_test::assert_ok!(rest.set_ai_model("claude").await);
    assert_eq!(changed.current_model.as_deref(), Some("claude"));

    let Err(ClientError::Api { status, message }) = rest.set_ai_model("llama").await else {
        panic!("unsupported model should be rejected");
    };
    assert_eq!(status, 400);
    assert_eq!(message, "unsupported model");
}
