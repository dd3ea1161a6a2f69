//! Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use relay_core::UserId;
use relay_telemetry::{MetricSample, MetricsRecorder};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::{self, ConnectionSettings};
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::relay::Relay;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub config: Arc<ServerConfig>,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            relay: Arc::new(Relay::new(metrics)),
            config: Arc::new(config),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }
}

/// Handshake query parameters for `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

impl ConnectParams {
    /// The connection's identity; an empty or blank value means anonymous.
    pub fn identity(&self) -> Option<UserId> {
        self.user_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .map(UserId::from_raw)
    }
}

/// Build the Axum router with all routes. Every origin is accepted.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve. Returns once the listener is bound.
pub async fn start(
    config: ServerConfig,
    metrics: Arc<MetricsRecorder>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(config, metrics);
    let listener = tokio::net::TcpListener::bind(state.config.bind_addr()).await?;
    let local_addr = listener.local_addr()?;

    let router = build_router(state.clone());
    let token = state.shutdown.token();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "relay server stopped with error");
        }
    });

    tracing::info!(addr = %local_addr, "relay server started");

    Ok(ServerHandle {
        addr: local_addr,
        relay: state.relay,
        shutdown: state.shutdown,
        server,
    })
}

/// Handle returned by [`start`]; keeps the server task alive.
pub struct ServerHandle {
    pub addr: SocketAddr,
    relay: Arc<Relay>,
    shutdown: Arc<ShutdownCoordinator>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Stop accepting, close every connection, and wait for the server task.
    pub async fn shutdown(self) {
        self.shutdown.shutdown();
        if let Err(e) = self.server.await {
            tracing::warn!(error = %e, "server task did not exit cleanly");
        }
    }
}

/// GET /ws?userId=...
///
/// New upgrades are refused once shutdown has begun.
async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    let user = params.identity();
    let settings = ConnectionSettings::from(state.config.as_ref());
    let token = state.shutdown.token();
    let relay = Arc::clone(&state.relay);

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            client::run_connection(socket, relay, user, settings, token).await;
        })
        .into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.relay.registry()))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Json<Vec<MetricSample>> {
    Json(state.relay.metrics().snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::outbox::Outbox;

    fn make_state() -> AppState {
        AppState::new(ServerConfig::default(), Arc::new(MetricsRecorder::new()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn identity_from_query() {
        let params = ConnectParams {
            user_id: Some("42".into()),
        };
        assert_eq!(params.identity(), Some(UserId::from_raw("42")));
        assert!(ConnectParams { user_id: Some(String::new()) }.identity().is_none());
        assert!(ConnectParams { user_id: Some("  ".into()) }.identity().is_none());
        assert!(ConnectParams::default().identity().is_none());
    }

    #[tokio::test]
    async fn health_endpoint_returns_counts() {
        let state = make_state();
        state
            .relay
            .connect(Some(UserId::from_raw("1")), Outbox::channel(1).0);
        let (status, body) = get_json(build_router(state), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 1);
        assert_eq!(body["identities"], 1);
        assert_eq!(body["groups"], 0);
    }

    #[tokio::test]
    async fn metrics_endpoint_lists_series() {
        let state = make_state();
        state.relay.connect(None, Outbox::channel(1).0);
        let (status, body) = get_json(build_router(state), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["name"].as_str())
            .collect();
        assert!(names.contains(&"relay_connections_opened"));
        assert!(names.contains(&"relay_connections_active"));
    }

    #[tokio::test]
    async fn ws_endpoint_requires_upgrade() {
        let app = build_router(make_state());
        let req = Request::builder().uri("/ws?userId=1").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn ws_endpoint_refuses_during_shutdown() {
        let state = make_state();
        state.shutdown.shutdown();
        let app = build_router(state);
        let req = Request::builder().uri("/ws?userId=1").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let app = build_router(make_state());
        let req = Request::builder()
            .uri("/health")
            .header("origin", "https://example.org")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = build_router(make_state());
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn start_binds_ephemeral_port_and_shuts_down() {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        let handle = start(config, Arc::new(MetricsRecorder::new())).await.unwrap();
        assert!(handle.port() > 0);
        assert_eq!(handle.relay().registry().connection_count(), 0);
        handle.shutdown().await;
    }
}
