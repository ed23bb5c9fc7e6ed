//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service router.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream AI service definitions, in declaration order.
    pub ai_services: Vec<ServiceConfig>,

    /// Circuit breaker thresholds shared by all services.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Load balancing strategy.
    pub load_balancing: LoadBalancingConfig,

    /// Pre-forward health probe settings.
    pub health_check: HealthCheckConfig,

    /// Forwarding timeout in seconds for services that do not set their own.
    pub default_timeout: u64,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A single upstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service identifier.
    pub name: String,

    /// Base URL requests are forwarded to (e.g., "http://127.0.0.1:5001").
    pub url: String,

    /// Selection priority; lower numbers are tried first.
    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Per-service forwarding timeout in seconds.
    /// Falls back to `default_timeout` when absent.
    pub timeout: Option<u64>,

    /// Disabled services are never selected.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_priority() -> u32 {
    999
}

fn default_enabled() -> bool {
    true
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before a service's breaker opens.
    pub failure_threshold: u32,

    /// Seconds an open breaker waits before allowing a probe.
    pub recovery_timeout: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: 60,
        }
    }
}

/// Load balancing configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadBalancingConfig {
    pub strategy: Strategy,
}

/// Candidate ordering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Strict priority order; the first available service always goes first.
    #[default]
    Priority,
    /// Rotate the available list so load spreads across equally-ranked services.
    RoundRobin,
}

/// Pre-forward health probe configuration.
///
/// Probes run only for request paths listed in `critical_paths`, so ordinary
/// traffic never pays the extra round trip.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable pre-forward probing.
    pub enabled: bool,

    /// Path probed on the candidate service.
    pub path: String,

    /// Probe timeout in seconds.
    pub timeout: u64,

    /// Request paths that require a passing probe before forwarding.
    pub critical_paths: Vec<String>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/health".to_string(),
            timeout: 5,
            critical_paths: vec!["/upload".to_string(), "/download".to_string()],
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            ai_services: Vec::new(),
            circuit_breaker: CircuitBreakerConfig::default(),
            load_balancing: LoadBalancingConfig::default(),
            health_check: HealthCheckConfig::default(),
            default_timeout: 300,
        }
    }
}
