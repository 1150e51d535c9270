//! Response header projection.
//!
//! Only the headers a media element needs to interpret a partial response
//! are relayed. Cookies, auth challenges, caching directives and hop-by-hop
//! headers from the origin never reach the browser.

use axum::http::{header, HeaderMap, HeaderName};

/// Upstream headers copied to the client. Everything else is dropped.
pub const RELAYED_HEADERS: [HeaderName; 4] = [
    header::CONTENT_RANGE,
    header::CONTENT_LENGTH,
    header::CONTENT_TYPE,
    header::ACCEPT_RANGES,
];

/// Project an upstream header map onto the allow-list.
///
/// `HeaderName` is normalised to lowercase on parse, so the lookup is
/// case-insensitive with respect to what the origin sent.
pub fn project_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut projected = HeaderMap::with_capacity(RELAYED_HEADERS.len());
    for name in RELAYED_HEADERS {
        for value in upstream.get_all(&name) {
            projected.append(name.clone(), value.clone());
        }
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn upstream_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Range", HeaderValue::from_static("bytes 0-99/1000"));
        headers.insert("Content-Length", HeaderValue::from_static("100"));
        headers.insert("Content-Type", HeaderValue::from_static("video/mp4"));
        headers.insert("Accept-Ranges", HeaderValue::from_static("bytes"));
        headers.append("Set-Cookie", HeaderValue::from_static("x=1"));
        headers.append("Set-Cookie", HeaderValue::from_static("session=abc"));
        headers.insert("WWW-Authenticate", HeaderValue::from_static("Basic"));
        headers.insert("Connection", HeaderValue::from_static("keep-alive"));
        headers.insert("Transfer-Encoding", HeaderValue::from_static("chunked"));
        headers.insert("Server", HeaderValue::from_static("origin/1.0"));
        headers
    }

    #[test]
    fn keeps_only_allow_listed_headers() {
        let projected = project_headers(&upstream_headers());

        assert_eq!(projected.len(), 4);
        for name in projected.keys() {
            assert!(RELAYED_HEADERS.contains(name), "unexpected header {name}");
        }
        assert_eq!(projected[header::CONTENT_RANGE], "bytes 0-99/1000");
        assert_eq!(projected[header::CONTENT_LENGTH], "100");
        assert_eq!(projected[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(projected[header::ACCEPT_RANGES], "bytes");
    }

    #[test]
    fn never_relays_cookies() {
        let projected = project_headers(&upstream_headers());
        assert!(projected.get(header::SET_COOKIE).is_none());
        assert!(projected.get(header::WWW_AUTHENTICATE).is_none());
        assert!(projected.get(header::CONNECTION).is_none());
    }

    #[test]
    fn missing_headers_stay_missing() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/vnd.apple.mpegurl"));
        let projected = project_headers(&headers);
        assert_eq!(projected.len(), 1);
        assert!(projected.get(header::CONTENT_RANGE).is_none());
    }
}
