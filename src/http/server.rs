//! HTTP server adapter.
//!
//! # Responsibilities
//! - Create the Axum router with a catch-all forwarding handler
//! - Translate axum requests to the engine's normalized types and back
//! - Wire up middleware (tracing, request ID)
//! - Serve with graceful shutdown

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::config::RouterConfig;
use crate::engine::{ForwardingEngine, ProxyRequest, ProxyResponse};

/// Largest inbound request body the server will buffer.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
struct AppState {
    engine: Arc<ForwardingEngine>,
}

/// Request ID generator (UUID v4).
#[derive(Clone, Copy, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// HTTP server for the service router.
pub struct HttpServer {
    router: Router,
    config: RouterConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RouterConfig) -> Self {
        let engine = Arc::new(ForwardingEngine::from_config(&config));
        Self::with_engine(config, engine)
    }

    /// Create a server around an existing engine (used by tests).
    pub fn with_engine(config: RouterConfig, engine: Arc<ForwardingEngine>) -> Self {
        let state = AppState { engine };

        let router = Router::new()
            .route("/{*path}", any(route_handler))
            .route("/", any(route_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        Self { router, config }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

/// Catch-all handler: normalize, route, denormalize.
async fn route_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let proxy_request = match normalize_request(request).await {
        Ok(req) => req,
        Err(response) => return response,
    };

    tracing::debug!(
        method = %proxy_request.method,
        path = %proxy_request.path,
        "Routing request"
    );

    let response = state.engine.route(proxy_request).await;
    into_axum_response(response)
}

async fn normalize_request(request: Request<Body>) -> Result<ProxyRequest, Response> {
    let (parts, body) = request.into_parts();

    let query: Vec<(String, String)> = parts
        .uri
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Failed to read request body");
            (StatusCode::BAD_REQUEST, "Invalid request body").into_response()
        })?;

    Ok(ProxyRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query,
        headers: parts.headers,
        body: if bytes.is_empty() { None } else { Some(bytes) },
    })
}

/// Raw HTTP is binary-safe, so the binary flag needs no extra encoding here.
fn into_axum_response(response: ProxyResponse) -> Response {
    let mut builder = axum::http::Response::builder().status(response.status);
    if let Some(headers) = builder.headers_mut() {
        *headers = response.headers;
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
