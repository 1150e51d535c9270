//! Session-setup endpoints used by the player before it starts ranging.

use std::time::Instant;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorBody, ProxyError};
use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::handler::target_url;
use crate::resolver::Resolution;

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

/// Body of a successful `/api/resolve`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    #[serde(flatten)]
    pub resolution: Resolution,
    pub original_url: String,
    pub proxy_url: String,
}

/// `GET /api/resolve` — find the playable stream behind a page URL.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = headers.request_id();

    let result = async {
        let page = target_url(query.url.as_deref())?;
        let resolution = state.resolver.resolve(&page).await?;
        Ok::<_, ProxyError>(ResolveResponse {
            proxy_url: resolution.proxy_path(),
            original_url: page.to_string(),
            resolution,
        })
    }
    .await;

    let response = match result {
        Ok(body) => {
            tracing::info!(
                request_id = %request_id,
                original_url = %body.original_url,
                stream_url = %body.resolution.stream_url,
                "Resolved stream"
            );
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Resolve failed");
            e.into_response()
        }
    };

    metrics::record_request("resolve", response.status().as_u16(), start_time);
    response
}

/// `GET /api/metadata` — HEAD-probe a media URL for title, type and size.
pub async fn metadata_handler(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
    headers: HeaderMap,
) -> Response {
    let start_time = Instant::now();
    let request_id = headers.request_id();

    let response = match target_url(query.url.as_deref()) {
        Err(e) => e.into_response(),
        Ok(url) => match state.prober.probe(&url).await {
            Ok(metadata) => (StatusCode::OK, Json(metadata)).into_response(),
            Err(e) => {
                tracing::warn!(request_id = %request_id, url = %url, error = %e, "Metadata probe failed");
                let body = ErrorBody {
                    error: "Failed to fetch metadata".to_string(),
                    details: Some(e.to_string()),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        },
    };

    metrics::record_request("metadata", response.status().as_u16(), start_time);
    response
}
