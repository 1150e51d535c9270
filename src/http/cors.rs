//! Cross-origin headers.
//!
//! Media elements on other origins load proxied URLs directly, and script
//! players (hls.js, dash.js) fetch them with XHR, so `Range` must be an
//! allowed request header and the range response headers must be exposed.

use std::time::Duration;

use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsConfig;

pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::RANGE, header::CONTENT_TYPE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::CONTENT_LENGTH,
            header::ACCEPT_RANGES,
            header::CONTENT_TYPE,
        ])
        .max_age(Duration::from_secs(config.max_age_secs))
}
