//! Stream resolution.
//!
//! # Data Flow
//! ```text
//! page URL (anything the user pasted)
//!     → ResolverChain
//!         → play_api.rs  (site-specific JSON API, claims its own host)
//!         → heuristic.rs (direct media check, then page scrape)
//!     → Resolution { stream_url, referer }
//!     → /api/proxy?url=…&referer=… handed to the player
//! ```
//!
//! # Design Decisions
//! - Runs once per playback session, never per range request
//! - Only the output shape matters to the proxy; scraping heuristics are
//!   replaceable behind `StreamResolver`
//! - Resolvers are tried in order and the last error wins, so the generic
//!   fallback decides the reported failure

pub mod heuristic;
pub mod play_api;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::error::ProxyError;

pub use heuristic::HeuristicResolver;
pub use play_api::PlayApiResolver;

/// Where the playable bytes live, and the referer the origin expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub stream_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

impl Resolution {
    /// The page URL is already the media resource.
    pub fn direct(url: &Url) -> Self {
        Self {
            stream_url: url.to_string(),
            referer: None,
        }
    }

    /// Path of the proxy endpoint that plays this resolution.
    pub fn proxy_path(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("url", &self.stream_url);
        if let Some(referer) = &self.referer {
            query.append_pair("referer", referer);
        }
        format!("/api/proxy?{}", query.finish())
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No video stream found on this page")]
    NotFound,

    #[error("Target is not a text/html page")]
    NotHtml,

    #[error("Failed to resolve URL")]
    Transport(#[from] reqwest::Error),

    /// A site-specific API answered with something unusable.
    #[error("Unexpected API response: {0}")]
    Api(String),
}

impl From<ResolveError> for ProxyError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::NotFound | ResolveError::Api(_) => ProxyError::NotFound(error.to_string()),
            ResolveError::NotHtml => ProxyError::UnsupportedContent(error.to_string()),
            ResolveError::Transport(e) => ProxyError::Resolve(e),
        }
    }
}

/// Maps an arbitrary page URL to a playable stream.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this resolver should be consulted for `url`.
    fn handles(&self, _url: &Url) -> bool {
        true
    }

    async fn resolve(&self, url: &Url) -> Result<Resolution, ResolveError>;
}

/// Tries resolvers in order until one succeeds.
#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn StreamResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: impl StreamResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

#[async_trait]
impl StreamResolver for ResolverChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn resolve(&self, url: &Url) -> Result<Resolution, ResolveError> {
        let mut last_error = None;

        for resolver in self.resolvers.iter().filter(|r| r.handles(url)) {
            match resolver.resolve(url).await {
                Ok(resolution) => {
                    tracing::debug!(
                        resolver = resolver.name(),
                        url = %url,
                        stream_url = %resolution.stream_url,
                        "Stream resolved"
                    );
                    return Ok(resolution);
                }
                Err(e) => {
                    tracing::debug!(resolver = resolver.name(), url = %url, error = %e, "Resolver failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ResolveError::NotFound))
    }
}
