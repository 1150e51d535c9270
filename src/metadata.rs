//! Media metadata probe.
//!
//! A single upstream HEAD tells the player what it is about to load:
//! a display title guessed from the URL, the content type, the size, and
//! whether the origin will serve it at all.

use std::time::Duration;

use axum::http::header;
use serde::Serialize;
use url::Url;

use crate::config::{RelayConfig, TimeoutConfig};

const UNKNOWN_TITLE: &str = "Unknown Video";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub title: String,
    pub content_type: Option<String>,
    pub size: Option<u64>,
    pub valid: bool,
}

/// Percent-decoded last non-empty path segment, or a placeholder.
pub fn title_from_url(url: &Url) -> String {
    let Some(segment) = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
    else {
        return UNKNOWN_TITLE.to_string();
    };

    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

#[derive(Debug, Clone)]
pub struct MetadataProber {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
}

impl MetadataProber {
    pub fn new(client: reqwest::Client, relay: &RelayConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            client,
            user_agent: relay.user_agent.clone(),
            timeout: Duration::from_secs(timeouts.upstream_secs),
        }
    }

    /// HEAD `url`. Any HTTP status is a result; only transport failures error.
    pub async fn probe(&self, url: &Url) -> Result<MediaMetadata, reqwest::Error> {
        let response = self
            .client
            .head(url.clone())
            .header(header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await?;

        let headers = response.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let status = response.status().as_u16();

        tracing::debug!(url = %url, status, size = ?size, "Metadata probed");

        Ok(MediaMetadata {
            title: title_from_url(url),
            content_type,
            size,
            valid: (200..400).contains(&status),
        })
    }
}
