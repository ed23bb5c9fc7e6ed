//! Failover router for interchangeable AI services.
//!
//! Selects one upstream per inbound request, fails over to alternates on
//! error, and isolates persistently failing services behind per-service
//! circuit breakers.

pub mod breaker;
pub mod config;
pub mod engine;
pub mod http;
pub mod registry;
pub mod selector;
pub mod transport;

pub use config::RouterConfig;
pub use engine::ForwardingEngine;
pub use http::HttpServer;
