//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON/TOML)
//!     → loader.rs (parse & deserialize)
//!     → RouterConfig (defaults applied, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the service set is replaced as a whole,
//!   never patched in place
//! - All fields have defaults to allow minimal configs
//! - A broken config falls back to a single-service default instead of
//!   aborting startup

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_or_fallback, ConfigError};
pub use schema::{
    CircuitBreakerConfig, HealthCheckConfig, ListenerConfig, LoadBalancingConfig, RouterConfig,
    ServiceConfig, Strategy,
};
