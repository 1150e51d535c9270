//! Proxy endpoint handler.

use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use url::Url;

use crate::error::ProxyError;
use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::range::{negotiate, MalformedRange};
use crate::proxy::relay::relay;
use crate::proxy::upstream::UpstreamRequest;

/// Query string of `GET /api/proxy`.
#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
    pub referer: Option<String>,
}

/// Validate the `url` query parameter as an absolute http(s) URL.
pub fn target_url(raw: Option<&str>) -> Result<Url, ProxyError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ProxyError::MissingParameter("url"))?;

    let url = Url::parse(raw).map_err(|e| ProxyError::InvalidParameter {
        name: "url",
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProxyError::InvalidParameter {
            name: "url",
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn referer_override(raw: Option<&str>) -> Result<Option<HeaderValue>, ProxyError> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            HeaderValue::from_str(s).map_err(|_| ProxyError::InvalidParameter {
                name: "referer",
                reason: "not a valid header value".to_string(),
            })
        })
        .transpose()
}

fn range_header(headers: &HeaderMap) -> Result<Option<&str>, ProxyError> {
    headers
        .get(header::RANGE)
        .map(|v| {
            v.to_str().map_err(|_| {
                ProxyError::MalformedRange(MalformedRange {
                    header: String::from_utf8_lossy(v.as_bytes()).into_owned(),
                    reason: "not visible ASCII",
                })
            })
        })
        .transpose()
}

/// `GET /api/proxy` — relay one bounded byte range of `url`.
pub async fn proxy_handler(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = headers.request_id();

    let response = match forward(&state, &query, &headers, request_id.clone()).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                status = %e.status_code(),
                error = %e,
                "Proxy request rejected"
            );
            e.into_response()
        }
    };

    metrics::record_request("proxy", response.status().as_u16(), start_time);
    response
}

async fn forward(
    state: &AppState,
    query: &ProxyQuery,
    headers: &HeaderMap,
    request_id: String,
) -> Result<Response, ProxyError> {
    let target = target_url(query.url.as_deref())?;
    let referer = referer_override(query.referer.as_deref())?;
    let range = negotiate(range_header(headers)?, state.relay.chunk_size)?;

    tracing::debug!(
        request_id = %request_id,
        url = %target,
        range = %range,
        referer = referer.is_some(),
        "Proxying range"
    );

    let request = UpstreamRequest::new(target, range, referer);
    let upstream = state.fetcher.fetch(&request).await?;

    let status = upstream.status();
    if status.as_u16() >= 400 {
        // Dropping `upstream` here closes the origin connection unread.
        return Err(ProxyError::UpstreamStatus(status));
    }

    relay(upstream, range, &state.relay, request_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_required() {
        assert!(matches!(
            target_url(None),
            Err(ProxyError::MissingParameter("url"))
        ));
        assert!(matches!(
            target_url(Some("  ")),
            Err(ProxyError::MissingParameter("url"))
        ));
    }

    #[test]
    fn url_must_be_absolute_http() {
        assert!(target_url(Some("/relative/video.mp4")).is_err());
        assert!(target_url(Some("ftp://files.example.com/video.mp4")).is_err());
        assert!(target_url(Some("file:///etc/passwd")).is_err());

        let url = target_url(Some("https://cdn.example.com/v.mp4?sig=a%2Fb")).unwrap();
        assert_eq!(url.host_str(), Some("cdn.example.com"));
        assert_eq!(url.query(), Some("sig=a%2Fb"));
    }

    #[test]
    fn empty_referer_means_none() {
        assert!(referer_override(None).unwrap().is_none());
        assert!(referer_override(Some("")).unwrap().is_none());
        assert_eq!(
            referer_override(Some("https://example.com/")).unwrap().unwrap(),
            "https://example.com/"
        );
        assert!(referer_override(Some("bad\r\nvalue")).is_err());
    }

    #[test]
    fn range_header_must_be_text() {
        let mut headers = HeaderMap::new();
        assert_eq!(range_header(&headers).unwrap(), None);

        headers.insert(header::RANGE, HeaderValue::from_static("bytes=0-"));
        assert_eq!(range_header(&headers).unwrap(), Some("bytes=0-"));

        headers.insert(header::RANGE, HeaderValue::from_bytes(b"bytes=\xff-").unwrap());
        assert!(range_header(&headers).is_err());
    }
}
