//! Upstream HTTP transport.
//!
//! # Responsibilities
//! - Send one prepared request to one upstream URL
//! - Enforce the per-attempt timeout, cancelling the in-flight send
//! - Buffer the response so the engine can classify and forward it
//!
//! # Design Decisions
//! - The engine only sees the [`HttpTransport`] trait; tests substitute a
//!   scripted transport, production uses the hyper client
//! - A timed-out send is cancelled by dropping the future, never left running
//! - Timeout, connect, and protocol failures are distinct variants but the
//!   engine treats them all as attempt failures

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

/// Largest upstream response body the router will buffer.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// One prepared attempt against one upstream service.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

/// Buffered upstream response, unclassified.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Errors raised by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response within the per-attempt deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused, DNS failure, or the connection died mid-exchange.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request could not be constructed for the upstream.
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

/// Capability to send one HTTP request and observe the outcome.
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError>;
}

/// Production transport backed by the hyper legacy client.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for HyperTransport {
    async fn send(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let uri: Uri = request
            .url
            .as_str()
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| TransportError::InvalidRequest(e.to_string()))?;

        let mut builder = axum::http::Request::builder()
            .method(request.method.clone())
            .uri(uri);
        if let Some(headers) = builder.headers_mut() {
            *headers = request.headers.clone();
        }

        let body = match request.body {
            Some(bytes) => Body::from(bytes),
            None => Body::empty(),
        };
        let req = builder
            .body(body)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        // The deadline covers the full exchange, response body included.
        let exchange = async {
            let response = self
                .client
                .request(req)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            let (parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(body), MAX_BODY_BYTES)
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;
            Ok(UpstreamResponse {
                status: parts.status,
                headers: parts.headers,
                body: bytes,
            })
        };

        match tokio::time::timeout(request.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(request.timeout)),
        }
    }
}
