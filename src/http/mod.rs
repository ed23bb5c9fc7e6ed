//! HTTP adapters.
//!
//! # Data Flow
//! ```text
//! Raw HTTP:
//!     axum request → server.rs (normalize) → engine → axum response
//!
//! Platform event:
//!     JSON envelope → envelope.rs (normalize, base64-decode)
//!         → engine → envelope (base64-encode binary bodies)
//! ```

pub mod envelope;
pub mod server;

pub use envelope::{handle_envelope, RequestEnvelope, ResponseEnvelope};
pub use server::HttpServer;
