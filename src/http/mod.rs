//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (assign x-request-id)
//!     → cors.rs (preflight, cross-origin headers)
//!     → /api/proxy    → proxy::handler
//!     → /api/resolve  → api.rs → resolver chain
//!     → /api/metadata → api.rs → metadata probe
//!     → Send to client
//! ```

pub mod api;
pub mod cors;
pub mod request;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
