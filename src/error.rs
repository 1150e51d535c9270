//! Request-level error taxonomy.
//!
//! Every failure a handler can hit before response headers are committed is a
//! `ProxyError`. Rendering is a status code plus a short JSON body. Once a
//! relayed body has started, `StreamInterrupted` is surfaced only as a body
//! error, which makes hyper drop the connection.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::proxy::range::MalformedRange;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// A required query parameter was absent or empty.
    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),

    /// A query parameter was present but unusable.
    #[error("Invalid {name} parameter: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The client's `Range` header could not be parsed.
    #[error(transparent)]
    MalformedRange(#[from] MalformedRange),

    /// DNS, connect, TLS or timeout failure talking to upstream.
    #[error("Upstream request failed")]
    Transport(#[source] reqwest::Error),

    /// The page behind `/api/resolve` could not be fetched.
    #[error("Failed to resolve URL")]
    Resolve(#[source] reqwest::Error),

    /// Upstream ignored `Range` and its whole body ends before `start`.
    #[error("Range start {start} is beyond the resource length {total}")]
    RangeNotSatisfiable { start: u64, total: u64 },

    /// Upstream answered, but with a 4xx/5xx status.
    #[error("Upstream responded with {0}")]
    UpstreamStatus(StatusCode),

    /// The upstream body failed after headers were sent.
    #[error("Upstream stream interrupted: {0}")]
    StreamInterrupted(String),

    /// No playable stream could be located.
    #[error("{0}")]
    NotFound(String),

    /// The resolved page is not something that can be scanned.
    #[error("{0}")]
    UnsupportedContent(String),
}

impl ProxyError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingParameter(_)
            | ProxyError::InvalidParameter { .. }
            | ProxyError::MalformedRange(_) => StatusCode::BAD_REQUEST,
            ProxyError::Transport(_) | ProxyError::Resolve(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProxyError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ProxyError::UpstreamStatus(status) => *status,
            ProxyError::StreamInterrupted(_) => StatusCode::BAD_GATEWAY,
            ProxyError::NotFound(_) => StatusCode::NOT_FOUND,
            ProxyError::UnsupportedContent(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ProxyError::Transport(e) | ProxyError::Resolve(e) => ErrorBody {
                error: self.to_string(),
                details: Some(e.to_string()),
            },
            ProxyError::UpstreamStatus(status) => ErrorBody {
                error: status
                    .canonical_reason()
                    .unwrap_or("Upstream error")
                    .to_string(),
                details: None,
            },
            _ => ErrorBody {
                error: self.to_string(),
                details: None,
            },
        };
        let mut response = (status, Json(body)).into_response();
        if let ProxyError::RangeNotSatisfiable { total, .. } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{total}")) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}
