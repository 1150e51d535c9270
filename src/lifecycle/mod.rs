//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → HttpServer stops accepting → in-flight relays finish → exit
//! ```
//!
//! # Design Decisions
//! - Relays are bounded by the chunk ceiling, so draining is short
//! - Tests drive shutdown directly through `Shutdown`, no signals needed

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
