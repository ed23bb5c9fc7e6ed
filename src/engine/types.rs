//! Normalized request/response types and routing errors.

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Platform-independent view of one inbound request.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Request path including the leading slash.
    pub path: String,
    /// Query parameters in original order.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// Result of routing one request, ready for the platform adapter.
///
/// `is_binary` tells the adapter the body needs a transport-safe encoding;
/// the engine never performs that encoding itself.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub is_binary: bool,
}

/// Reasons the engine could not produce an upstream response.
///
/// Per-service failures never surface here; they are recorded against the
/// breaker and the loop moves on. Only exhaustion or a core fault escapes.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Every service was disabled, breaker-open, or failed its attempt.
    #[error("no service available")]
    NoServiceAvailable { last_error: Option<String> },

    /// The request method cannot be forwarded to a base-URL service.
    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),

    /// Unexpected fault in the router itself.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Structured JSON body for synthetic error responses.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
    /// Seconds since the Unix epoch.
    timestamp: f64,
}

fn epoch_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

impl RouteError {
    /// Render the error as a synthetic response for the caller.
    pub fn into_response(self) -> ProxyResponse {
        let (status, body) = match self {
            RouteError::NoServiceAvailable { last_error: None } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    error: "Service not reachable at this moment",
                    message: "All AI services are currently unavailable. Please try again later."
                        .to_string(),
                    last_error: None,
                    timestamp: epoch_seconds(),
                },
            ),
            RouteError::NoServiceAvailable { last_error } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    error: "Service not reachable at this moment",
                    message: "All AI services failed to process the request. Please try again later."
                        .to_string(),
                    last_error,
                    timestamp: epoch_seconds(),
                },
            ),
            RouteError::UnsupportedMethod(method) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Unsupported method",
                    message: format!("Method {} is not supported by this router.", method),
                    last_error: None,
                    timestamp: epoch_seconds(),
                },
            ),
            RouteError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Internal server error",
                    message,
                    last_error: None,
                    timestamp: epoch_seconds(),
                },
            ),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );

        let body = serde_json::to_vec(&body).unwrap_or_default();
        ProxyResponse {
            status,
            headers,
            body: Bytes::from(body),
            is_binary: false,
        }
    }
}
