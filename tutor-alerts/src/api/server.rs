//! API server setup and configuration.

use axum::Router;
use axum::extract::{MatchedPath, Request};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::database::DbPool;
use crate::error::Result;
use crate::logging::LoggingConfig;
use crate::notification::{NotificationGateway, RoomHub};

/// Default API port.
pub const DEFAULT_API_PORT: u16 = 12580;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_API_PORT,
            enable_cors: true,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub gateway: NotificationGateway,
    /// Room hub backing the push WebSocket
    pub hub: RoomHub,
    /// Pool probed by the health check
    pub pool: Option<DbPool>,
    /// Logging configuration for dynamic log level changes
    pub logging_config: Option<Arc<LoggingConfig>>,
}

impl AppState {
    pub fn new(gateway: NotificationGateway, hub: RoomHub) -> Self {
        Self {
            start_time: Instant::now(),
            gateway,
            hub,
            pool: None,
            logging_config: None,
        }
    }

    pub fn with_pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_logging_config(mut self, config: Arc<LoggingConfig>) -> Self {
        self.logging_config = Some(config);
        self
    }
}

fn is_health_probe(req: &Request) -> bool {
    req.uri().path().starts_with("/health")
}

/// Segments under `/api/notifications/` that name a collection, not a record.
const COLLECTION_SEGMENTS: [&str; 5] = ["student", "group", "stats", "delivery", "ws"];

/// Notification id addressed by a request path, if any.
fn notification_id_from_path(path: &str) -> Option<&str> {
    let id = path.strip_prefix("/api/notifications/")?.split('/').next()?;
    (!id.is_empty() && !COLLECTION_SEGMENTS.contains(&id)).then_some(id)
}

fn request_span(req: &Request) -> Span {
    if is_health_probe(req) {
        return Span::none();
    }
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| req.uri().path());
    let span = tracing::info_span!(
        "request",
        method = %req.method(),
        route = %route,
        notification_id = tracing::field::Empty,
    );
    if let Some(id) = notification_id_from_path(req.uri().path()) {
        span.record("notification_id", id);
    }
    span
}

pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, so a process-wide shutdown stops the server.
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone());

        if self.config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router = router.layer(cors);
        }

        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_request(())
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let status = res.status().as_u16();
                        let latency_ms = latency.as_millis() as u64;
                        if res.status().is_server_error() {
                            tracing::warn!(parent: span, status, latency_ms, "Request failed");
                        } else {
                            tracing::info!(parent: span, status, latency_ms, "Request completed");
                        }
                    },
                )
                .on_failure(()),
        )
    }

    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| crate::error::Error::ApiError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("API server listening on http://{}", addr);
        self.serve(listener).await
    }

    /// Serve on an already bound listener until the cancel token fires.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let router = self.build_router();
        let cancel_token = self.cancel_token.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| crate::error::Error::ApiError(format!("Server error: {}", e)))?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApiServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 12580);
        assert!(config.enable_cors);
    }

    #[test]
    fn test_notification_id_from_path() {
        assert_eq!(notification_id_from_path("/api/notifications/abc"), Some("abc"));
        assert_eq!(notification_id_from_path("/api/notifications/abc/read"), Some("abc"));
        assert_eq!(notification_id_from_path("/api/notifications/abc/respond"), Some("abc"));
        assert_eq!(notification_id_from_path("/api/notifications/student/S1"), None);
        assert_eq!(notification_id_from_path("/api/notifications/stats/S1"), None);
        assert_eq!(notification_id_from_path("/api/notifications/ws"), None);
        assert_eq!(notification_id_from_path("/api/notifications"), None);
        assert_eq!(notification_id_from_path("/api/logging"), None);
    }

    #[test]
    fn test_health_probe_has_no_span() {
        let req = Request::builder().uri("/health").body(axum::body::Body::empty()).unwrap();
        assert!(request_span(&req).is_disabled());
    }
}
