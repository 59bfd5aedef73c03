//! HTTP entry point that relays posted messages to every authorized chat user.
//!
//! `POST /send_message` takes `{"message": "..."}` and broadcasts it.
//! `GET /test?message=...` is restricted to loopback callers and re-posts the
//! message to `/send_message` over the network, for manual checks.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::broadcast::Broadcaster;
use crate::config::GatewayConfig;
use crate::platform::FormatMode;

#[derive(Clone)]
pub struct GatewayState {
    broadcaster: Arc<Broadcaster>,
    client: reqwest::Client,
    /// Where `/test` posts to; points back at this server.
    send_url: String,
}

impl GatewayState {
    pub fn new(broadcaster: Arc<Broadcaster>, send_url: String) -> Self {
        Self {
            broadcaster,
            client: reqwest::Client::new(),
            send_url,
        }
    }
}

#[derive(Deserialize)]
struct SendMessageRequest {
    message: String,
    #[serde(default)]
    parse_mode: Option<Value>,
}

/// Resolve the requested mode; anything unrecognised falls back to the default.
fn requested_mode(parse_mode: Option<&Value>) -> FormatMode {
    let Some(value) = parse_mode else {
        return FormatMode::default();
    };
    match value.as_str().and_then(FormatMode::from_name) {
        Some(mode) => mode,
        None => {
            warn!("Unknown parse_mode {}, using the default", value);
            FormatMode::default()
        }
    }
}

#[derive(Deserialize)]
struct TestParams {
    message: Option<String>,
}

type JsonResponse = (StatusCode, Json<Value>);

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/send_message", post(send_message))
        .route("/test", get(send_test_request))
        .with_state(state)
}

/// Bind the listener and serve until the server fails.
pub async fn serve(config: GatewayConfig, broadcaster: Arc<Broadcaster>) -> Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {addr}"))?;
    let local = listener
        .local_addr()
        .context("Failed to read gateway address")?;

    let send_url = self_send_url(local);
    let app = router(GatewayState::new(broadcaster, send_url));

    info!("Gateway listening on http://{}", local);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Gateway server error")
}

/// URL of this server's own `/send_message`, reachable from the host itself.
fn self_send_url(local: SocketAddr) -> String {
    let ip = match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}/send_message", SocketAddr::new(ip, local.port()))
}

fn is_loopback(addr: &SocketAddr) -> bool {
    addr.ip().to_canonical().is_loopback()
}

async fn send_message(State(state): State<GatewayState>, body: Bytes) -> JsonResponse {
    let request: SendMessageRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected /send_message body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid request" })),
            );
        }
    };

    let mode = requested_mode(request.parse_mode.as_ref());
    let broadcaster = state.broadcaster.clone();

    // Detached so a client disconnect cannot cut the send loop short.
    let task = tokio::spawn(async move { broadcaster.broadcast(&request.message, mode).await });
    match task.await {
        Ok(report) => info!(
            "Relayed message: {} delivered, {} failed",
            report.delivered, report.failed
        ),
        Err(e) => error!("Broadcast task failed: {}", e),
    }

    (
        StatusCode::OK,
        Json(json!({ "status": "Message sent successfully" })),
    )
}

async fn send_test_request(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<GatewayState>,
    Query(params): Query<TestParams>,
) -> JsonResponse {
    if !is_loopback(&peer) {
        warn!("Rejected /test call from {}", peer);
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Unauthorized. This endpoint can only be called from localhost."
            })),
        );
    }

    let Some(message) = params.message.filter(|m| !m.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing 'message' parameter" })),
        );
    };

    info!("Sending test request to {}", state.send_url);

    let result = state
        .client
        .post(&state.send_url)
        .json(&json!({ "message": message }))
        .send()
        .await;

    match result {
        Ok(response) if response.status() == reqwest::StatusCode::OK => {
            info!("Test message sent successfully");
            (
                StatusCode::OK,
                Json(json!({ "status": "Test message sent successfully" })),
            )
        }
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Failed to send test message ({}): {}", status, body);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to send test message" })),
            )
        }
        Err(e) => {
            error!("Error sending test request: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}
