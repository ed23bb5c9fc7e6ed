//! Service registry.
//!
//! # Responsibilities
//! - Represent the configured upstream services as immutable data
//! - Filter out disabled services
//! - Order candidates by priority, ties broken by declaration order
//!
//! # Design Decisions
//! - Registry is immutable after construction (thread-safe without locks)
//! - Invalid service URLs are skipped at load time with a warning, not fatal
//! - An empty listing is a valid result meaning "no services configured"

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::config::RouterConfig;

/// A single upstream service, immutable for the lifetime of a config load.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Unique service identifier.
    pub name: String,
    /// Pre-parsed base URL requests are forwarded to.
    pub base_url: Url,
    /// Selection priority; lower numbers are tried first.
    pub priority: u32,
    /// Per-attempt forwarding timeout.
    pub timeout: Duration,
    /// Disabled services are never selected.
    pub enabled: bool,
}

/// Holds the ordered set of candidate services from one config load.
#[derive(Debug)]
pub struct BackendRegistry {
    services: Vec<Arc<Backend>>,
}

impl BackendRegistry {
    /// Build a registry from configuration.
    ///
    /// Services with unparseable URLs are dropped here so the selection path
    /// never has to deal with them.
    pub fn from_config(config: &RouterConfig) -> Self {
        let mut services = Vec::with_capacity(config.ai_services.len());

        for svc in &config.ai_services {
            match Url::parse(&svc.url) {
                Ok(base_url) => {
                    let timeout =
                        Duration::from_secs(svc.timeout.unwrap_or(config.default_timeout));
                    services.push(Arc::new(Backend {
                        name: svc.name.clone(),
                        base_url,
                        priority: svc.priority,
                        timeout,
                        enabled: svc.enabled,
                    }));
                }
                Err(e) => {
                    tracing::warn!(service = %svc.name, url = %svc.url, error = %e, "Invalid service URL, skipping");
                }
            }
        }

        Self { services }
    }

    /// Enabled services sorted by ascending priority, declaration order on ties.
    pub fn list_enabled(&self) -> Vec<Arc<Backend>> {
        let mut enabled: Vec<Arc<Backend>> = self
            .services
            .iter()
            .filter(|b| b.enabled)
            .cloned()
            .collect();
        // sort_by_key is stable, preserving declaration order within a priority
        enabled.sort_by_key(|b| b.priority);
        enabled
    }

    /// All services regardless of enabled flag.
    pub fn all(&self) -> &[Arc<Backend>] {
        &self.services
    }
}
