//! Forwarding engine.
//!
//! # Data Flow
//! ```text
//! normalized request
//!     → selector.select() (candidate order, computed once)
//!     → for each candidate, in order:
//!         probe if the path is critical
//!         → transport.send() with the candidate's timeout
//!         → [200, 400): record_success, return response
//!         → otherwise: record_failure, remember error, next candidate
//!     → exhausted: synthetic 503 with last error
//! ```
//!
//! # Design Decisions
//! - Failover is strictly sequential; candidates are never probed in parallel
//! - The same service is never retried within one request
//! - Transport failures and HTTP errors are identical for breaker purposes
//! - An attempt cancelled mid-flight is recorded as a failure; an unconfirmed
//!   outcome is not a confirmed success

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, Method};
use url::Url;

use crate::breaker::CircuitBreakerStore;
use crate::config::{HealthCheckConfig, RouterConfig};
use crate::registry::{Backend, BackendRegistry};
use crate::selector::BackendSelector;
use crate::transport::{HttpTransport, HyperTransport, UpstreamRequest, UpstreamResponse};

pub use types::{ProxyRequest, ProxyResponse, RouteError};

/// Headers that never cross the proxy boundary, either direction.
const HOP_BY_HOP_HEADERS: [&str; 4] = ["host", "connection", "content-length", "transfer-encoding"];

/// Content-type prefixes surfaced with the binary flag set.
const BINARY_CONTENT_TYPES: [&str; 5] = [
    "application/pdf",
    "image/",
    "video/",
    "audio/",
    "application/octet-stream",
];

/// Executes the selection → attempt → record → failover loop.
#[derive(Debug)]
pub struct ForwardingEngine {
    selector: Arc<BackendSelector>,
    breakers: Arc<CircuitBreakerStore>,
    transport: Arc<dyn HttpTransport>,
    health: HealthCheckConfig,
}

impl ForwardingEngine {
    pub fn new(
        selector: Arc<BackendSelector>,
        breakers: Arc<CircuitBreakerStore>,
        transport: Arc<dyn HttpTransport>,
        health: HealthCheckConfig,
    ) -> Self {
        Self {
            selector,
            breakers,
            transport,
            health,
        }
    }

    /// Wire the full stack from configuration with the production transport.
    pub fn from_config(config: &RouterConfig) -> Self {
        let registry = Arc::new(BackendRegistry::from_config(config));
        let breakers = Arc::new(CircuitBreakerStore::new(config.circuit_breaker));
        let selector = Arc::new(BackendSelector::new(
            registry,
            breakers.clone(),
            config.load_balancing.strategy,
        ));
        Self::new(
            selector,
            breakers,
            Arc::new(HyperTransport::new()),
            config.health_check.clone(),
        )
    }

    /// Route one request: forward to successive candidates until one succeeds
    /// or the candidate list is exhausted. Always returns a response.
    pub async fn route(&self, request: ProxyRequest) -> ProxyResponse {
        if request.method == Method::CONNECT || request.method == Method::TRACE {
            tracing::warn!(method = %request.method, "Rejecting unroutable method");
            return RouteError::UnsupportedMethod(request.method).into_response();
        }

        let candidates = self.selector.select();
        if candidates.is_empty() {
            tracing::error!("No available services found");
            return RouteError::NoServiceAvailable { last_error: None }.into_response();
        }

        let forward_headers = strip_hop_by_hop(&request.headers);
        let mut last_error: Option<String> = None;

        for backend in candidates {
            tracing::info!(service = %backend.name, url = %backend.base_url, "Trying service");

            if self.requires_probe(&request.path) && !self.probe(&backend).await {
                self.breakers.record_failure(&backend.name);
                last_error = Some(format!("Service {} failed its health probe", backend.name));
                continue;
            }

            let target = match build_target(&backend.base_url, &request.path, &request.query) {
                Ok(url) => url,
                Err(e) => {
                    tracing::error!(service = %backend.name, error = %e, "Failed to build upstream URL");
                    return RouteError::Internal(format!("invalid upstream URL: {}", e))
                        .into_response();
                }
            };

            let attempt = UpstreamRequest {
                method: request.method.clone(),
                url: target,
                headers: forward_headers.clone(),
                body: request.body.clone(),
                timeout: backend.timeout,
            };

            let started = std::time::Instant::now();
            let guard = OutcomeGuard::new(&self.breakers, &backend.name);
            match self.transport.send(attempt).await {
                Ok(response) if (200..400).contains(&response.status.as_u16()) => {
                    tracing::info!(
                        service = %backend.name,
                        status = %response.status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Request processed"
                    );
                    guard.success();
                    return forward_response(response);
                }
                Ok(response) => {
                    let description =
                        format!("Service {} returned status {}", backend.name, response.status);
                    tracing::warn!(
                        service = %backend.name,
                        status = %response.status,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Service error, failing over"
                    );
                    guard.failure();
                    last_error = Some(description);
                }
                Err(e) => {
                    tracing::warn!(
                        service = %backend.name,
                        error = %e,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Transport failure, failing over"
                    );
                    guard.failure();
                    last_error = Some(format!("Service {} unreachable: {}", backend.name, e));
                }
            }
        }

        tracing::error!("All services failed to process the request");
        RouteError::NoServiceAvailable { last_error }.into_response()
    }

    fn requires_probe(&self, path: &str) -> bool {
        self.health.enabled && self.health.critical_paths.iter().any(|p| p == path)
    }

    /// Probe the service's health endpoint before spending the real request.
    async fn probe(&self, backend: &Backend) -> bool {
        let Ok(url) = build_target(&backend.base_url, &self.health.path, &[]) else {
            return false;
        };

        let request = UpstreamRequest {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: Duration::from_secs(self.health.timeout),
        };

        match self.transport.send(request).await {
            Ok(response) if response.status.is_success() => true,
            Ok(response) => {
                tracing::warn!(service = %backend.name, status = %response.status, "Health probe failed");
                false
            }
            Err(e) => {
                tracing::warn!(service = %backend.name, error = %e, "Health probe failed");
                false
            }
        }
    }
}

/// Records exactly one outcome per attempt. Dropping the guard without an
/// explicit outcome counts as a failure.
struct OutcomeGuard<'a> {
    breakers: &'a CircuitBreakerStore,
    name: &'a str,
    resolved: bool,
}

impl<'a> OutcomeGuard<'a> {
    fn new(breakers: &'a CircuitBreakerStore, name: &'a str) -> Self {
        Self {
            breakers,
            name,
            resolved: false,
        }
    }

    fn success(mut self) {
        self.resolved = true;
        self.breakers.record_success(self.name);
    }

    fn failure(mut self) {
        self.resolved = true;
        self.breakers.record_failure(self.name);
    }
}

impl Drop for OutcomeGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.breakers.record_failure(self.name);
        }
    }
}

/// Copy headers, dropping the hop-by-hop set.
fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        if !HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// True when the response content type marks a body the platform adapter
/// must encode before returning.
fn is_binary_content(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            BINARY_CONTENT_TYPES
                .iter()
                .any(|prefix| ct.starts_with(prefix))
        })
        .unwrap_or(false)
}

/// Base address + path + query, mirroring how the request arrived.
fn build_target(
    base: &Url,
    path: &str,
    query: &[(String, String)],
) -> Result<Url, url::ParseError> {
    let joined = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    let mut url = Url::parse(&joined)?;
    if !query.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    Ok(url)
}

fn forward_response(upstream: UpstreamResponse) -> ProxyResponse {
    let is_binary = is_binary_content(&upstream.headers);
    ProxyResponse {
        status: upstream.status,
        headers: strip_hop_by_hop(&upstream.headers),
        body: upstream.body,
        is_binary,
    }
}
