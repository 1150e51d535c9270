//! Response relay.
//!
//! # Responsibilities
//! - Choose the client status code from the upstream one
//! - Project upstream headers onto the allow-list
//! - Stream the upstream body through a bounded buffer
//! - Cut the negotiated span out of a full body when upstream ignored `Range`
//!
//! # Streaming model
//! ```text
//! upstream body ──▶ reader task ──▶ mpsc(buffer_chunks) ──▶ client body
//!        ▲                │                                     │
//!        └─ dropped ◀─────┴──── tx.closed() ◀── rx dropped ◀────┘
//! ```
//! The reader task owns the upstream response. It exits, and so releases
//! the upstream connection, when the body ends, when upstream errors, or
//! when the client body is dropped (client disconnect).

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use futures_util::{stream, Stream, StreamExt};
use tokio::sync::mpsc;

use crate::config::{RelayConfig, StatusPolicy};
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::proxy::headers::project_headers;
use crate::proxy::range::ByteRange;

impl StatusPolicy {
    /// Status sent to the client for an upstream answer below 400.
    pub fn client_status(self, upstream: StatusCode) -> StatusCode {
        match self {
            StatusPolicy::AlwaysPartial => StatusCode::PARTIAL_CONTENT,
            StatusPolicy::Forward => upstream,
        }
    }
}

/// How a relayed stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    ClientGone,
    UpstreamFailed,
}

impl StreamOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamOutcome::Completed => "completed",
            StreamOutcome::ClientGone => "client_gone",
            StreamOutcome::UpstreamFailed => "upstream_failed",
        }
    }
}

/// Tracks one in-flight relay. Counts down the active gauge on drop, so
/// the count stays right even if the reader task panics.
#[derive(Debug)]
struct StreamGuard {
    request_id: String,
    started: Instant,
    bytes: u64,
    outcome: StreamOutcome,
}

impl StreamGuard {
    fn new(request_id: String) -> Self {
        metrics::stream_started();
        Self {
            request_id,
            started: Instant::now(),
            bytes: 0,
            outcome: StreamOutcome::Completed,
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        metrics::stream_finished(self.bytes, self.outcome.as_str());
        tracing::debug!(
            request_id = %self.request_id,
            bytes = self.bytes,
            outcome = self.outcome.as_str(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Relay finished"
        );
    }
}

/// Part of the upstream body forwarded to the client.
///
/// Unbounded for a real partial response. When upstream ignored `Range`
/// and sent the whole resource, the window cuts the negotiated span out
/// of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    skip: u64,
    limit: Option<u64>,
}

impl ByteWindow {
    pub const ALL: ByteWindow = ByteWindow { skip: 0, limit: None };

    pub fn new(skip: u64, limit: Option<u64>) -> Self {
        Self { skip, limit }
    }

    /// Trim `chunk` to what is left of the window, consuming it.
    fn admit(&mut self, chunk: Bytes) -> Bytes {
        let skipped = self.skip.min(chunk.len() as u64);
        self.skip -= skipped;
        let mut chunk = chunk.slice(skipped as usize..);
        if let Some(limit) = self.limit.as_mut() {
            let keep = (*limit).min(chunk.len() as u64);
            *limit -= keep;
            chunk.truncate(keep as usize);
        }
        chunk
    }

    fn is_exhausted(&self) -> bool {
        self.limit == Some(0)
    }
}

/// How a whole-resource `200` is cut down to the negotiated range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatedRange {
    pub window: ByteWindow,
    pub content_range: String,
    pub content_length: Option<u64>,
}

/// Plan serving `range` out of a body of `total` bytes (if known).
pub fn emulate_range(range: ByteRange, total: Option<u64>) -> Result<EmulatedRange, ProxyError> {
    let start = range.start;
    match total {
        Some(total) if start >= total => Err(ProxyError::RangeNotSatisfiable { start, total }),
        Some(total) => {
            let last = range.end.map_or(total - 1, |end| end.min(total - 1));
            let len = last - start + 1;
            Ok(EmulatedRange {
                window: ByteWindow::new(start, Some(len)),
                content_range: format!("bytes {start}-{last}/{total}"),
                content_length: Some(len),
            })
        }
        None => {
            let last = range.end.unwrap_or(u64::MAX - 1);
            Ok(EmulatedRange {
                window: ByteWindow::new(start, Some(last.saturating_sub(start).saturating_add(1))),
                content_range: format!("bytes {start}-{last}/*"),
                content_length: None,
            })
        }
    }
}

/// Turn a non-error upstream response into the client response.
///
/// A `200` means upstream ignored `Range`; the span is then cut out of the
/// full body locally and always answered as `206`.
pub fn relay(
    upstream: reqwest::Response,
    range: ByteRange,
    config: &RelayConfig,
    request_id: String,
) -> Result<Response, ProxyError> {
    let mut headers = project_headers(upstream.headers());

    let (status, window) = if upstream.status() == StatusCode::OK {
        let emulated = emulate_range(range, upstream.content_length())?;
        tracing::debug!(
            request_id = %request_id,
            content_range = %emulated.content_range,
            "Upstream ignored Range, trimming full body"
        );
        set_header(&mut headers, header::CONTENT_RANGE, &emulated.content_range);
        match emulated.content_length {
            Some(len) => set_header(&mut headers, header::CONTENT_LENGTH, &len.to_string()),
            None => {
                headers.remove(header::CONTENT_LENGTH);
            }
        }
        (StatusCode::PARTIAL_CONTENT, emulated.window)
    } else {
        (config.status_policy.client_status(upstream.status()), ByteWindow::ALL)
    };

    let body = pump(upstream.bytes_stream(), window, config.buffer_chunks, request_id);

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Copy the `window` of `upstream` into a response body through a channel
/// of `capacity` chunks.
///
/// The channel is the backpressure: a slow client fills it and the reader
/// stops polling upstream. An upstream error is forwarded as a body error,
/// which makes the server abort the connection instead of ending it
/// cleanly.
pub fn pump<S, E>(upstream: S, window: ByteWindow, capacity: usize, request_id: String) -> Body
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<Bytes, ProxyError>>(capacity.max(1));

    tokio::spawn(async move {
        let mut guard = StreamGuard::new(request_id);
        let mut window = window;
        tokio::pin!(upstream);

        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    guard.outcome = StreamOutcome::ClientGone;
                    tracing::debug!(request_id = %guard.request_id, "Client went away, cancelling upstream");
                    break;
                }
                next = upstream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let chunk = window.admit(chunk);
                    if !chunk.is_empty() {
                        let len = chunk.len() as u64;
                        if tx.send(Ok(chunk)).await.is_err() {
                            guard.outcome = StreamOutcome::ClientGone;
                            tracing::debug!(request_id = %guard.request_id, "Client went away, cancelling upstream");
                            break;
                        }
                        guard.bytes += len;
                    }
                    if window.is_exhausted() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    guard.outcome = StreamOutcome::UpstreamFailed;
                    tracing::warn!(
                        request_id = %guard.request_id,
                        bytes = guard.bytes,
                        error = %e,
                        "Upstream stream failed mid-transfer"
                    );
                    let _ = tx.send(Err(ProxyError::StreamInterrupted(e.to_string()))).await;
                    break;
                }
                None => break,
            }
        }
    });

    Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}
