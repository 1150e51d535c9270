//! Site-specific resolver for hosts exposing a JSON play API.
//!
//! The landing page hands out session cookies that the API insists on, so
//! resolution is two calls: fetch the page to harvest cookies, then ask the
//! API for the stream list with those cookies, the page as `Referer`, and
//! the site as `Origin`.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::Deserialize;
use url::Url;

use crate::config::{PlayApiConfig, ResolverConfig, TimeoutConfig};
use crate::resolver::{ResolveError, Resolution, StreamResolver};

const PLAY_PATH: &str = "/wefeed-h5-bff/web/subject/play";

#[derive(Debug, Deserialize)]
struct PlayEnvelope {
    data: Option<PlayData>,
}

#[derive(Debug, Deserialize)]
struct PlayData {
    #[serde(default)]
    streams: Vec<PlayStream>,
}

#[derive(Debug, Deserialize)]
struct PlayStream {
    url: String,
}

/// Parameters the play API needs, lifted from a landing-page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayParams {
    pub subject_id: String,
    pub season: String,
    pub episode: String,
    pub detail_path: String,
}

impl PlayParams {
    /// `/spa/videoPlayPage/movies/<slug>?id=<subject>&detailSe=<s>&detailEp=<e>`
    pub fn from_page(url: &Url) -> Option<Self> {
        let query = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        };

        let subject_id = query("id")?;
        let detail_path = url
            .path_segments()
            .and_then(|mut segments| segments.nth(3))
            .unwrap_or_default()
            .to_string();

        Some(Self {
            subject_id,
            season: query("detailSe").unwrap_or_else(|| "1".to_string()),
            episode: query("detailEp").unwrap_or_else(|| "1".to_string()),
            detail_path,
        })
    }
}

/// Join the name=value part of every `Set-Cookie` into one `Cookie` value.
pub fn cookie_header(headers: &HeaderMap) -> String {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct PlayApiResolver {
    client: reqwest::Client,
    site: PlayApiConfig,
    user_agent: String,
    timeout: Duration,
}

impl PlayApiResolver {
    pub fn new(
        client: reqwest::Client,
        site: PlayApiConfig,
        config: &ResolverConfig,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self {
            client,
            site,
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(timeouts.resolve_secs),
        }
    }

    fn api_url(&self) -> Result<Url, ResolveError> {
        let base = self.site.api_base.trim_end_matches('/');
        Url::parse(&format!("{base}{PLAY_PATH}"))
            .map_err(|e| ResolveError::Api(format!("bad api_base: {e}")))
    }
}

#[async_trait]
impl StreamResolver for PlayApiResolver {
    fn name(&self) -> &'static str {
        "play_api"
    }

    fn handles(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| {
            host == self.site.host || host.ends_with(&format!(".{}", self.site.host))
        })
    }

    async fn resolve(&self, url: &Url) -> Result<Resolution, ResolveError> {
        let params = PlayParams::from_page(url).ok_or(ResolveError::NotFound)?;

        let page = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await?;
        let cookies = cookie_header(page.headers());
        drop(page);

        let envelope: PlayEnvelope = self
            .client
            .get(self.api_url()?)
            .query(&[
                ("subjectId", params.subject_id.as_str()),
                ("se", params.season.as_str()),
                ("ep", params.episode.as_str()),
                ("detail_path", params.detail_path.as_str()),
            ])
            .header(header::USER_AGENT, &self.user_agent)
            .header(header::ORIGIN, &self.site.origin)
            .header(header::REFERER, url.as_str())
            .header(header::COOKIE, cookies)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let stream = envelope
            .data
            .and_then(|data| data.streams.into_iter().next())
            .ok_or(ResolveError::NotFound)?;

        Ok(Resolution {
            stream_url: stream.url,
            referer: Some(format!("{}/", self.site.origin.trim_end_matches('/'))),
        })
    }
}
