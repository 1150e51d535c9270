//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

use stream_proxy::{HttpServer, ProxyConfig, Shutdown};

/// Size of the virtual file served at `/video.mp4`.
pub const RESOURCE_LEN: u64 = 50 * 1024 * 1024;

/// Size of the file at `/whole.bin`, which ignores `Range`.
pub const WHOLE_LEN: u64 = 20 * 1024 * 1024;

/// Default negotiated span: one chunk plus the inclusive end byte.
pub const CHUNK_SPAN: u64 = 5 * 1024 * 1024 + 1;

/// Content of the virtual file at `offset`.
pub fn byte_at(offset: u64) -> u8 {
    (offset % 251) as u8
}

/// Request headers seen by the mock origin.
#[derive(Clone, Default)]
pub struct OriginLog {
    requests: Arc<Mutex<Vec<HeaderMap>>>,
    hits: Arc<AtomicUsize>,
}

impl OriginLog {
    fn record(&self, headers: &HeaderMap) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(headers.clone());
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn ranges(&self) -> Vec<String> {
        self.header_values(header::RANGE)
    }

    pub fn header_values(&self, name: header::HeaderName) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|h| h.get(&name))
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let (start, end) = value.strip_prefix("bytes=")?.split_once('-')?;
    let start = start.parse().ok()?;
    let end = if end.is_empty() {
        RESOURCE_LEN - 1
    } else {
        end.parse().ok()?
    };
    Some((start, end.min(RESOURCE_LEN - 1)))
}

async fn serve_range(State(log): State<OriginLog>, headers: HeaderMap) -> Response {
    log.record(&headers);

    let ranged = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_range);
    let (start, end) = ranged.unwrap_or((0, RESOURCE_LEN - 1));
    let body: Vec<u8> = (start..=end).map(byte_at).collect();

    let status = if ranged.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_RANGE,
            format!("bytes {start}-{end}/{RESOURCE_LEN}"),
        )
        .header(header::SET_COOKIE, "session=secret; Path=/")
        .header(header::SERVER, "mock-origin")
        .header("x-origin-internal", "1")
        .body(Body::from(body))
        .unwrap()
}

async fn unranged(State(log): State<OriginLog>, headers: HeaderMap) -> Response {
    log.record(&headers);
    ([(header::CONTENT_TYPE, "video/mp4")], "whole file, range ignored").into_response()
}

async fn whole_file(State(log): State<OriginLog>, headers: HeaderMap) -> Response {
    log.record(&headers);
    let body: Vec<u8> = (0..WHOLE_LEN).map(byte_at).collect();
    ([(header::CONTENT_TYPE, "video/mp4")], body).into_response()
}

async fn forbidden(State(log): State<OriginLog>, headers: HeaderMap) -> Response {
    log.record(&headers);
    (StatusCode::FORBIDDEN, "hotlinking not allowed").into_response()
}

/// Start an origin that honors `Range` on a 50 MiB virtual file and serves
/// a handful of pages for the resolver.
pub async fn start_origin() -> (SocketAddr, OriginLog) {
    let log = OriginLog::default();
    let app = Router::new()
        .route("/video.mp4", get(serve_range))
        .route("/stream", get(unranged))
        .route("/whole.bin", get(whole_file))
        .route("/forbidden.mp4", get(forbidden))
        .route(
            "/watch.html",
            get(|| async {
                Html(
                    r#"<html><body>
                    <img src="https://cdn.example.com/poster.jpg">
                    <video src="https://cdn.example.com/v/clip.mp4?token=1"></video>
                    <source src="https://cdn.example.com/v/clip.m3u8">
                    </body></html>"#,
                )
            }),
        )
        .route(
            "/live.html",
            get(|| async {
                Html(r#"<script>player.load("https://cdn.example.com/live/index.m3u8")</script>"#)
            }),
        )
        .route(
            "/empty.html",
            get(|| async { Html("<html><body>nothing to play</body></html>") }),
        )
        .route(
            "/feed.json",
            get(|| async { Json(serde_json::json!({"video": "https://cdn.example.com/a.mp4"})) }),
        )
        .with_state(log.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, log)
}

/// Start a raw TCP backend. Each connection has its request head consumed,
/// then is handed to `handler`, which writes whatever bytes it likes.
pub async fn start_raw_backend<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(TcpStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                read_request_head(&mut socket).await;
                handler(socket).await;
            });
        }
    });
    addr
}

async fn read_request_head(socket: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
}

/// An address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Defaults, minus the site-specific resolver.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.resolver.play_api = None;
    config
}

/// Run the proxy on an ephemeral port. Keep the `Shutdown` alive for as
/// long as the proxy should serve.
pub async fn spawn_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });
    (addr, shutdown)
}

pub fn proxy_url(proxy: SocketAddr, target: &str) -> String {
    format!("http://{proxy}/api/proxy?url={}", urlencoding::encode(target))
}

pub fn api_url(proxy: SocketAddr, endpoint: &str, target: &str) -> String {
    format!(
        "http://{proxy}/api/{endpoint}?url={}",
        urlencoding::encode(target)
    )
}
