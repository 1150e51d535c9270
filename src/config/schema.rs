//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Chrome on Windows; the fixed identity sent to media origins.
pub const DEFAULT_UPSTREAM_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Chrome on macOS; used when fetching landing pages for resolution.
pub const DEFAULT_RESOLVER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 5 MiB per chunk keeps one relay well inside a 10s execution budget.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Root configuration for the streaming proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, concurrency).
    pub listener: ListenerConfig,

    /// Range relay behaviour.
    pub relay: RelayConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Stream resolution settings.
    pub resolver: ResolverConfig,

    /// Cross-origin headers on every response.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Which status code a successful relay answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusPolicy {
    /// Answer 206 whenever upstream delivered something below 400.
    #[default]
    AlwaysPartial,
    /// Relay upstream's own status code.
    Forward,
}

/// Range relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Maximum span requested upstream per client request, in bytes.
    /// A relayed window covers at most `chunk_size + 1` bytes.
    pub chunk_size: u64,

    /// Number of body chunks buffered between upstream and client.
    pub buffer_chunks: usize,

    /// Status code policy for successful relays.
    pub status_policy: StatusPolicy,

    /// User-Agent presented to media origins.
    pub user_agent: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_chunks: 16,
            status_policy: StatusPolicy::AlwaysPartial,
            user_agent: DEFAULT_UPSTREAM_USER_AGENT.to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total time for one upstream fetch, body included, in seconds.
    pub upstream_secs: u64,

    /// Timeout for each landing-page or API call made while resolving.
    pub resolve_secs: u64,

    /// Time allowed for a handler to produce response headers.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 10,
            resolve_secs: 10,
            request_secs: 30,
        }
    }
}

/// Stream resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// User-Agent presented to landing pages.
    pub user_agent: String,

    /// Maximum number of page bytes scanned for stream links.
    pub max_page_bytes: usize,

    /// Site-specific play API; `None` disables it.
    pub play_api: Option<PlayApiConfig>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_RESOLVER_USER_AGENT.to_string(),
            max_page_bytes: 4 * 1024 * 1024,
            play_api: Some(PlayApiConfig::default()),
        }
    }
}

/// A host whose pages are resolved through its JSON play API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayApiConfig {
    /// Host name the resolver claims (subdomains included).
    pub host: String,

    /// Value sent as `Origin`; also the referer handed to the proxy.
    pub origin: String,

    /// Base URL of the play API.
    pub api_base: String,
}

impl Default for PlayApiConfig {
    fn default() -> Self {
        Self {
            host: "filmboom.top".to_string(),
            origin: "https://filmboom.top".to_string(),
            api_base: "https://filmboom.top".to_string(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Add permissive CORS headers so proxied media is directly embeddable.
    pub enabled: bool,

    /// Preflight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_secs: 86_400,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
