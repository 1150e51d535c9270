//! Generic resolver: direct media detection and page scraping.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header;
use regex::Regex;
use url::Url;

use crate::config::{ResolverConfig, TimeoutConfig};
use crate::resolver::{ResolveError, Resolution, StreamResolver};

static DIRECT_MEDIA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(mp4|m3u8|mpd)($|\?)").expect("valid regex"));

static MP4_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^"'\s<>]+\.mp4[^"'\s<>]*"#).expect("valid regex"));

static M3U8_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^"'\s<>]+\.m3u8[^"'\s<>]*"#).expect("valid regex"));

/// True when the URL itself names a media file or manifest.
pub fn is_direct_media(url: &str) -> bool {
    DIRECT_MEDIA.is_match(url)
}

/// First progressive link on the page, else the first HLS manifest.
///
/// Links embedded in JSON blobs arrive with `\u0026` and escaped slashes;
/// both are undone.
pub fn find_stream_url(html: &str) -> Option<String> {
    let found = MP4_LINK
        .find(html)
        .or_else(|| M3U8_LINK.find(html))?
        .as_str();
    Some(found.replace("\\u0026", "&").replace('\\', ""))
}

fn is_textual(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.is_empty()
        || content_type.starts_with("text/")
        || content_type.contains("html")
        || content_type.contains("xml")
        || content_type.contains("javascript")
}

/// Resolves any page by inspecting it for media links.
pub struct HeuristicResolver {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
    max_page_bytes: usize,
}

impl HeuristicResolver {
    pub fn new(client: reqwest::Client, config: &ResolverConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            client,
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(timeouts.resolve_secs),
            max_page_bytes: config.max_page_bytes,
        }
    }

    /// Read at most `max_page_bytes` of the body as text.
    async fn read_page(&self, mut response: reqwest::Response) -> Result<String, ResolveError> {
        let mut page = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_page_bytes - page.len();
            if chunk.len() >= room {
                page.extend_from_slice(&chunk[..room]);
                break;
            }
            page.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&page).into_owned())
    }
}

#[async_trait]
impl StreamResolver for HeuristicResolver {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn resolve(&self, url: &Url) -> Result<Resolution, ResolveError> {
        if is_direct_media(url.as_str()) {
            return Ok(Resolution::direct(url));
        }

        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.contains("video") {
            return Ok(Resolution::direct(url));
        }
        if !is_textual(&content_type) {
            return Err(ResolveError::NotHtml);
        }

        let page = self.read_page(response).await?;
        let stream_url = find_stream_url(&page).ok_or(ResolveError::NotFound)?;

        Ok(Resolution {
            stream_url,
            referer: Some(url.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_direct_media_urls() {
        assert!(is_direct_media("https://cdn.example.com/movie.mp4"));
        assert!(is_direct_media("https://cdn.example.com/live/index.m3u8?token=1"));
        assert!(is_direct_media("https://cdn.example.com/dash/manifest.mpd"));
        assert!(!is_direct_media("https://example.com/watch?v=mp4"));
        assert!(!is_direct_media("https://example.com/movie.mp4.html"));
    }

    #[test]
    fn prefers_mp4_over_m3u8() {
        let html = r#"
            <script>var hls = "https://cdn.example.com/master.m3u8";</script>
            <video src="https://cdn.example.com/clip.mp4?quality=720"></video>
        "#;
        assert_eq!(
            find_stream_url(html).as_deref(),
            Some("https://cdn.example.com/clip.mp4?quality=720")
        );
    }

    #[test]
    fn falls_back_to_m3u8() {
        let html = "<source src='https://cdn.example.com/hls/index.m3u8'>";
        assert_eq!(
            find_stream_url(html).as_deref(),
            Some("https://cdn.example.com/hls/index.m3u8")
        );
    }

    #[test]
    fn unescapes_json_embedded_links() {
        let html = r#"{"src":"https://cdn.example.com\/v\/a.mp4?x=1\u0026y=2"}"#;
        assert_eq!(
            find_stream_url(html).as_deref(),
            Some("https://cdn.example.com/v/a.mp4?x=1&y=2")
        );
    }

    #[test]
    fn nothing_to_find() {
        assert_eq!(find_stream_url("<html><body>No video here</body></html>"), None);
    }

    #[test]
    fn textual_content_types() {
        assert!(is_textual("text/html; charset=utf-8"));
        assert!(is_textual("application/xhtml+xml"));
        assert!(is_textual(""));
        assert!(!is_textual("application/json"));
        assert!(!is_textual("image/png"));
    }
}
