//! Platform envelope adapter.
//!
//! Serverless platforms hand the router a JSON event instead of a raw HTTP
//! request. This module translates that envelope to and from the engine's
//! normalized types. Base64 handling for binary bodies lives here and only
//! here; the engine just flags them.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{ForwardingEngine, ProxyRequest, ProxyResponse};

/// Inbound platform event.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestEnvelope {
    pub http_method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub query_string_parameters: Option<BTreeMap<String, String>>,
    pub body: Option<String>,
    pub is_base64_encoded: bool,
}

impl Default for RequestEnvelope {
    fn default() -> Self {
        Self {
            http_method: "GET".to_string(),
            path: "/".to_string(),
            headers: BTreeMap::new(),
            query_string_parameters: None,
            body: None,
            is_base64_encoded: false,
        }
    }
}

/// Outbound platform response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

/// Errors translating an envelope into a normalized request.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid base64 body: {0}")]
    InvalidBody(#[from] base64::DecodeError),
}

impl RequestEnvelope {
    /// Translate the envelope into the engine's normalized request.
    pub fn into_proxy_request(self) -> Result<ProxyRequest, EnvelopeError> {
        let method = Method::from_bytes(self.http_method.as_bytes())
            .map_err(|_| EnvelopeError::InvalidMethod(self.http_method.clone()))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => {
                    tracing::warn!(header = %name, "Dropping malformed envelope header");
                }
            }
        }

        let query: Vec<(String, String)> = self
            .query_string_parameters
            .unwrap_or_default()
            .into_iter()
            .collect();

        let body = match self.body {
            Some(text) if self.is_base64_encoded => Some(Bytes::from(BASE64.decode(text)?)),
            Some(text) => Some(Bytes::from(text.into_bytes())),
            None => None,
        };

        Ok(ProxyRequest {
            method,
            path: self.path,
            query,
            headers,
            body,
        })
    }
}

impl ResponseEnvelope {
    /// Translate an engine response into the platform shape.
    ///
    /// Binary bodies are base64-encoded here, as signalled by the engine's
    /// binary flag.
    pub fn from_proxy_response(response: ProxyResponse) -> Self {
        let headers: BTreeMap<String, String> = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let (body, is_base64_encoded) = if response.is_binary {
            (BASE64.encode(&response.body), true)
        } else {
            (String::from_utf8_lossy(&response.body).into_owned(), false)
        };

        Self {
            status_code: response.status.as_u16(),
            headers,
            body,
            is_base64_encoded,
        }
    }
}

/// Handle one platform event end to end.
pub async fn handle_envelope(
    engine: &ForwardingEngine,
    envelope: RequestEnvelope,
) -> ResponseEnvelope {
    let request = match envelope.into_proxy_request() {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting malformed envelope");
            return ResponseEnvelope {
                status_code: 400,
                headers: BTreeMap::from([(
                    "content-type".to_string(),
                    "application/json".to_string(),
                )]),
                body: serde_json::json!({
                    "error": "Bad request",
                    "message": e.to_string(),
                })
                .to_string(),
                is_base64_encoded: false,
            };
        }
    };

    ResponseEnvelope::from_proxy_response(engine.route(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn envelope_parses_platform_event() {
        let event = r#"{
            "httpMethod": "POST",
            "path": "/generate",
            "headers": {"Content-Type": "application/json", "X-Api-Key": "k"},
            "queryStringParameters": {"model": "small"},
            "body": "{\"prompt\": \"hi\"}",
            "isBase64Encoded": false
        }"#;

        let envelope: RequestEnvelope = serde_json::from_str(event).unwrap();
        let request = envelope.into_proxy_request().unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/generate");
        assert_eq!(request.headers.get("x-api-key").unwrap(), "k");
        assert_eq!(
            request.query,
            vec![("model".to_string(), "small".to_string())]
        );
        assert_eq!(request.body.unwrap(), Bytes::from_static(b"{\"prompt\": \"hi\"}"));
    }

    #[test]
    fn base64_request_body_is_decoded() {
        let envelope = RequestEnvelope {
            http_method: "POST".to_string(),
            body: Some(BASE64.encode(b"\x00\x01binary")),
            is_base64_encoded: true,
            ..RequestEnvelope::default()
        };

        let request = envelope.into_proxy_request().unwrap();
        assert_eq!(request.body.unwrap(), Bytes::from_static(b"\x00\x01binary"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let envelope: RequestEnvelope = serde_json::from_str("{}").unwrap();
        assert_eq!(envelope.http_method, "GET");
        assert_eq!(envelope.path, "/");
        assert!(!envelope.is_base64_encoded);
    }

    #[test]
    fn invalid_method_is_rejected() {
        let envelope = RequestEnvelope {
            http_method: "NOT A METHOD".to_string(),
            ..RequestEnvelope::default()
        };
        assert!(matches!(
            envelope.into_proxy_request(),
            Err(EnvelopeError::InvalidMethod(_))
        ));
    }

    #[test]
    fn binary_response_is_base64_encoded() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("image/png"));
        let response = ProxyResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(b"\x89PNG\r\n"),
            is_binary: true,
        };

        let envelope = ResponseEnvelope::from_proxy_response(response);
        assert!(envelope.is_base64_encoded);
        assert_eq!(BASE64.decode(&envelope.body).unwrap(), b"\x89PNG\r\n");
    }

    #[test]
    fn text_response_stays_plain() {
        let response = ProxyResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"hello"),
            is_binary: false,
        };

        let envelope = ResponseEnvelope::from_proxy_response(response);
        assert!(!envelope.is_base64_encoded);
        assert_eq!(envelope.body, "hello");
    }

    #[tokio::test]
    async fn handle_envelope_reports_unreachable_when_unconfigured() {
        let engine = ForwardingEngine::from_config(&crate::config::RouterConfig::default());
        let response = handle_envelope(&engine, RequestEnvelope::default()).await;

        assert_eq!(response.status_code, 503);
        assert!(!response.is_base64_encoded);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["error"], "Service not reachable at this moment");
    }

    #[tokio::test]
    async fn handle_envelope_rejects_bad_method() {
        let engine = ForwardingEngine::from_config(&crate::config::RouterConfig::default());
        let envelope = RequestEnvelope {
            http_method: "NOT A METHOD".to_string(),
            ..RequestEnvelope::default()
        };

        let response = handle_envelope(&engine, envelope).await;
        assert_eq!(response.status_code, 400);
    }

    #[test]
    fn response_envelope_uses_camel_case_keys() {
        let envelope = ResponseEnvelope {
            status_code: 200,
            headers: BTreeMap::new(),
            body: "ok".to_string(),
            is_base64_encoded: false,
        };

        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("statusCode").is_some());
        assert!(json.get("isBase64Encoded").is_some());
    }
}
