//! Per-service circuit breakers.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: service assumed down, excluded from selection
//! - Half-Open: recovery window elapsed, one probe decides
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures reaches failure_threshold
//! Open → Half-Open: recovery_timeout elapsed (computed on read, no timer)
//! Half-Open → Closed: next attempt succeeds
//! Half-Open → Open: next attempt fails, window restarts
//! ```
//!
//! # Design Decisions
//! - Per-service breaker keyed by service name (not global)
//! - Half-open is derived from open + elapsed time, never stored
//! - Time comes from an injected clock so transitions are testable
//! - DashMap gives per-entry locking; reads and writes for one service
//!   are serialized, different services never contend

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::CircuitBreakerConfig;

/// Source of the current time.
///
/// Production code uses [`SystemClock`]; tests substitute a manual clock to
/// step through recovery windows deterministically.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> Instant;
}

/// Clock backed by `Instant::now()`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Observable breaker state for one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStatus {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerStatus {
    pub fn name(&self) -> &'static str {
        match self {
            BreakerStatus::Closed => "closed",
            BreakerStatus::Open => "open",
            BreakerStatus::HalfOpen => "half_open",
        }
    }
}

/// Mutable breaker bookkeeping for one service.
#[derive(Debug, Clone, Copy, Default)]
struct BreakerEntry {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

/// Shared store of breaker state, keyed by service name.
///
/// Entries are created lazily on the first recorded outcome. `record_success`
/// and `record_failure` are total; neither can fail or panic.
#[derive(Debug)]
pub struct CircuitBreakerStore {
    entries: DashMap<String, BreakerEntry>,
    failure_threshold: u32,
    recovery_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerStore {
    /// Create a store with the system clock.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock.
    pub fn with_clock(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: Duration::from_secs(config.recovery_timeout),
            clock,
        }
    }

    /// Record a successful attempt: the breaker closes and counters reset.
    pub fn record_success(&self, name: &str) {
        let mut entry = self.entries.entry(name.to_string()).or_default();
        if entry.consecutive_failures >= self.failure_threshold {
            tracing::info!(service = name, "Service recovered, closing circuit breaker");
        }
        entry.consecutive_failures = 0;
        entry.last_failure = None;
    }

    /// Record a failed attempt.
    ///
    /// Reaching the failure threshold opens the breaker; a failure while the
    /// threshold is already met restarts the recovery window.
    pub fn record_failure(&self, name: &str) {
        let now = self.clock.now();
        let mut entry = self.entries.entry(name.to_string()).or_default();
        entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        entry.last_failure = Some(now);

        if entry.consecutive_failures == self.failure_threshold {
            tracing::warn!(
                service = name,
                failures = entry.consecutive_failures,
                "Circuit breaker opened"
            );
        } else {
            tracing::warn!(
                service = name,
                failures = entry.consecutive_failures,
                "Recorded service failure"
            );
        }
    }

    /// Derive the current status for a service.
    pub fn status(&self, name: &str) -> BreakerStatus {
        let Some(entry) = self.entries.get(name).map(|e| *e) else {
            return BreakerStatus::Closed;
        };
        if entry.consecutive_failures < self.failure_threshold {
            return BreakerStatus::Closed;
        }
        match entry.last_failure {
            Some(at) if self.clock.now().duration_since(at) < self.recovery_timeout => {
                BreakerStatus::Open
            }
            // Window elapsed: eligible for a probe without any state write.
            _ => BreakerStatus::HalfOpen,
        }
    }

    /// True when attempts to the service are permitted (closed or half-open).
    pub fn is_available(&self, name: &str) -> bool {
        self.status(name) != BreakerStatus::Open
    }

    /// Current consecutive failure count for a service.
    pub fn failure_count(&self, name: &str) -> u32 {
        self.entries
            .get(name)
            .map(|e| e.consecutive_failures)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Test clock advanced by hand.
    #[derive(Debug)]
    struct ManualClock(Mutex<Instant>);

    impl ManualClock {
        fn new() -> Self {
            Self(Mutex::new(Instant::now()))
        }

        fn advance(&self, d: Duration) {
            *self.0.lock().unwrap() += d;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }
    }

    fn store(threshold: u32, recovery_secs: u64) -> (CircuitBreakerStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let config = CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: recovery_secs,
        };
        (
            CircuitBreakerStore::with_clock(config, clock.clone()),
            clock,
        )
    }

    #[test]
    fn opens_exactly_at_threshold() {
        let (store, _) = store(3, 60);

        store.record_failure("svc");
        store.record_failure("svc");
        assert_eq!(store.status("svc"), BreakerStatus::Closed);
        assert!(store.is_available("svc"));

        store.record_failure("svc");
        assert_eq!(store.status("svc"), BreakerStatus::Open);
        assert!(!store.is_available("svc"));
    }

    #[test]
    fn half_open_after_recovery_window() {
        let (store, clock) = store(2, 60);

        store.record_failure("svc");
        store.record_failure("svc");
        assert_eq!(store.status("svc"), BreakerStatus::Open);

        clock.advance(Duration::from_secs(59));
        assert_eq!(store.status("svc"), BreakerStatus::Open);

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.status("svc"), BreakerStatus::HalfOpen);
        assert!(store.is_available("svc"));
        // Reinterpretation is read-only: the failure count is untouched.
        assert_eq!(store.failure_count("svc"), 2);
    }

    #[test]
    fn half_open_success_closes_and_resets() {
        let (store, clock) = store(2, 60);

        store.record_failure("svc");
        store.record_failure("svc");
        clock.advance(Duration::from_secs(60));
        assert_eq!(store.status("svc"), BreakerStatus::HalfOpen);

        store.record_success("svc");
        assert_eq!(store.status("svc"), BreakerStatus::Closed);
        assert_eq!(store.failure_count("svc"), 0);
    }

    #[test]
    fn half_open_failure_reopens_with_fresh_window() {
        let (store, clock) = store(2, 60);

        store.record_failure("svc");
        store.record_failure("svc");
        clock.advance(Duration::from_secs(60));
        assert_eq!(store.status("svc"), BreakerStatus::HalfOpen);

        store.record_failure("svc");
        assert_eq!(store.status("svc"), BreakerStatus::Open);

        // Previous window does not count toward the new one.
        clock.advance(Duration::from_secs(59));
        assert_eq!(store.status("svc"), BreakerStatus::Open);
        clock.advance(Duration::from_secs(1));
        assert_eq!(store.status("svc"), BreakerStatus::HalfOpen);
    }

    #[test]
    fn success_on_untracked_service_is_noop() {
        let (store, _) = store(2, 60);

        store.record_success("svc");
        assert_eq!(store.status("svc"), BreakerStatus::Closed);
        assert_eq!(store.failure_count("svc"), 0);

        store.record_success("svc");
        assert_eq!(store.status("svc"), BreakerStatus::Closed);
        assert_eq!(store.failure_count("svc"), 0);
    }

    #[test]
    fn success_resets_partial_failure_count() {
        let (store, _) = store(5, 60);

        store.record_failure("svc");
        store.record_failure("svc");
        assert_eq!(store.failure_count("svc"), 2);

        store.record_success("svc");
        assert_eq!(store.failure_count("svc"), 0);
        assert_eq!(store.status("svc"), BreakerStatus::Closed);
    }

    #[test]
    fn services_are_tracked_independently() {
        let (store, _) = store(1, 60);

        store.record_failure("down");
        assert!(!store.is_available("down"));
        assert!(store.is_available("up"));
    }
}
