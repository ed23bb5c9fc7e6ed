//! Candidate selection.
//!
//! # Data Flow
//! ```text
//! registry.list_enabled()
//!     → filter by breaker availability (open services drop out)
//!     → apply strategy:
//!         - priority (default): keep registry order
//!         - round_robin: rotate the list by a shared counter
//!     → ordered candidate list for one request
//! ```
//!
//! # Design Decisions
//! - Selection is computed once per request; a breaker opening mid-request
//!   does not reorder the already-computed list
//! - An empty candidate list is a valid result, not an error
//! - Rotation state is a single atomic counter shared across requests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::breaker::CircuitBreakerStore;
use crate::config::Strategy;
use crate::registry::{Backend, BackendRegistry};

/// Produces the ordered candidate list for a single request.
#[derive(Debug)]
pub struct BackendSelector {
    registry: Arc<BackendRegistry>,
    breakers: Arc<CircuitBreakerStore>,
    strategy: Strategy,
    rotation: AtomicUsize,
}

impl BackendSelector {
    pub fn new(
        registry: Arc<BackendRegistry>,
        breakers: Arc<CircuitBreakerStore>,
        strategy: Strategy,
    ) -> Self {
        Self {
            registry,
            breakers,
            strategy,
            rotation: AtomicUsize::new(0),
        }
    }

    /// Compute the candidate order for one request.
    pub fn select(&self) -> Vec<Arc<Backend>> {
        let mut candidates: Vec<Arc<Backend>> = self
            .registry
            .list_enabled()
            .into_iter()
            .filter(|b| {
                let available = self.breakers.is_available(&b.name);
                if !available {
                    tracing::debug!(service = %b.name, "Circuit breaker open, skipping");
                }
                available
            })
            .collect();

        if candidates.len() > 1 && self.strategy == Strategy::RoundRobin {
            let start = self.rotation.fetch_add(1, Ordering::Relaxed) % candidates.len();
            candidates.rotate_left(start);
        }

        candidates
    }
}
