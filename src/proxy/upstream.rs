//! Upstream fetcher.
//!
//! # Responsibilities
//! - Issue one ranged GET per client request
//! - Present a browser identity and the optional referer override
//! - Ask for identity encoding so `Content-Length` counts media bytes
//! - Report HTTP-level failures as data, transport failures as errors
//!
//! # Design Decisions
//! - Never retries; the media element's next range request is the retry
//! - The response body is handed back unread so the relay can stream it
//! - The wall-clock timeout covers the body as well as the headers

use std::time::Duration;

use axum::http::{header, HeaderValue};
use url::Url;

use crate::config::{RelayConfig, TimeoutConfig};
use crate::error::ProxyError;
use crate::proxy::range::ByteRange;

/// One outbound fetch. Immutable once built.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    target_url: Url,
    range: ByteRange,
    referer: Option<HeaderValue>,
}

impl UpstreamRequest {
    pub fn new(target_url: Url, range: ByteRange, referer: Option<HeaderValue>) -> Self {
        Self {
            target_url,
            range,
            referer,
        }
    }

    pub fn target_url(&self) -> &Url {
        &self.target_url
    }

    pub fn range(&self) -> ByteRange {
        self.range
    }

    pub fn referer(&self) -> Option<&HeaderValue> {
        self.referer.as_ref()
    }
}

/// Issues ranged GETs against arbitrary origins.
#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    client: reqwest::Client,
    user_agent: HeaderValue,
    timeout: Duration,
}

impl UpstreamFetcher {
    pub fn new(
        client: reqwest::Client,
        relay: &RelayConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, header::InvalidHeaderValue> {
        Ok(Self {
            client,
            user_agent: HeaderValue::from_str(&relay.user_agent)?,
            timeout: Duration::from_secs(timeouts.upstream_secs),
        })
    }

    /// Send the request and return as soon as upstream headers arrive.
    ///
    /// Any status code is a successful return; the caller decides what to
    /// do with 4xx/5xx. Only transport failures produce `Err`.
    pub async fn fetch(&self, request: &UpstreamRequest) -> Result<reqwest::Response, ProxyError> {
        let mut builder = self
            .client
            .get(request.target_url().clone())
            .timeout(self.timeout)
            .header(header::USER_AGENT, self.user_agent.clone())
            .header(header::RANGE, request.range().header_value())
            .header(header::ACCEPT_ENCODING, "identity");

        if let Some(referer) = request.referer() {
            builder = builder.header(header::REFERER, referer.clone());
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(
                url = %request.target_url(),
                range = %request.range(),
                error = %e,
                timeout = e.is_timeout(),
                "Upstream transport failure"
            );
            ProxyError::Transport(e)
        })?;

        tracing::debug!(
            url = %request.target_url(),
            range = %request.range(),
            status = %response.status(),
            "Upstream responded"
        );

        Ok(response)
    }
}
