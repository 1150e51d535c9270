//! Streaming range proxy.
//!
//! # Data Flow
//! ```text
//! GET /api/proxy?url=…&referer=…   (Range: bytes=S-E?)
//!     → range.rs    (parse + clamp to chunk ceiling)
//!     → upstream.rs (ranged GET with spoofed identity)
//!     → status ≥ 400? forward status, no body
//!     → relay.rs    (206 + allow-listed headers + bounded body pump;
//!                    a Range-ignoring 200 is trimmed to the span)
//!     → client
//! ```
//!
//! # Design Decisions
//! - Every request is independent; the media element drives the session
//!   by issuing the next `Range` itself
//! - The proxy under-serves large ranges instead of risking truncation
//!   past the execution budget
//! - Headers sent is a one-way commitment: later failures close the
//!   connection instead of producing an error status

pub mod handler;
pub mod headers;
pub mod range;
pub mod relay;
pub mod upstream;

pub use range::{negotiate, ByteRange, MalformedRange};
pub use relay::{relay, ByteWindow};
pub use upstream::{UpstreamFetcher, UpstreamRequest};
