//! HTTP and WebSocket routes
//!
//! - `GET /api/sensor-data`: current reading
//! - `GET /api/sensor-data/history`: recent readings, oldest first
//! - `GET /api/status`: link state, device and subscriber count
//! - `GET /health`
//! - WebSocket at `/` (and `/ws`) on the subscription listener: one JSON
//!   snapshot on connect, then one per merged update

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use sensorlink_core::datalog::LogEntry;
use sensorlink_core::hub::SubscriberHub;
use sensorlink_core::protocol::LinkStatus;
use sensorlink_core::query::QueryService;
use sensorlink_core::reading::Reading;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Pull access to the store and reading log
    pub query: QueryService,
    /// Subscriber fan-out
    pub hub: SubscriberHub,
    /// Latest link status published by the link manager
    pub link: watch::Receiver<LinkStatus>,
    /// Closes open WebSocket sessions on shutdown
    pub shutdown: CancellationToken,
}

#[derive(Serialize)]
struct StatusBody {
    #[serde(flatten)]
    link: LinkStatus,
    subscribers: usize,
}

/// Router for the query listener
pub fn http_router(state: AppState) -> Router {
    Router::new()
        .route("/api/sensor-data", get(sensor_data_handler))
        .route("/api/sensor-data/history", get(history_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Router for the subscription listener
pub fn ws_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn sensor_data_handler(State(state): State<AppState>) -> Json<Reading> {
    Json(state.query.current())
}

async fn history_handler(State(state): State<AppState>) -> Json<Vec<LogEntry>> {
    Json(state.query.history())
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let link = state.link.borrow().clone();
    Json(StatusBody {
        link,
        subscribers: state.hub.len(),
    })
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut subscription = state.hub.register();
    let id = subscription.id();
    info!(subscriber = %id, "client connected");

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            next = subscription.recv() => {
                // None: the hub already dropped us
                let Some(reading) = next else { break };
                let text = match serde_json::to_string(&reading) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(subscriber = %id, "failed to encode reading: {e}");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Inbound messages carry no meaning on this channel
                Some(Ok(_)) => {}
            },
        }
    }

    state.hub.unregister(id);
    info!(subscriber = %id, "client disconnected");
}
