//! Streaming range proxy for browser video playback.

pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod lifecycle;
pub mod metadata;
pub mod observability;
pub mod proxy;
pub mod resolver;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
