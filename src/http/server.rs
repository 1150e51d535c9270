//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, CORS, timeout, concurrency)
//! - Build the shared upstream client and the per-endpoint collaborators
//! - Serve until shutdown is signalled

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ProxyConfig, RelayConfig};
use crate::http::api::{metadata_handler, resolve_handler};
use crate::http::cors::cors_layer;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::shutdown;
use crate::metadata::MetadataProber;
use crate::proxy::handler::proxy_handler;
use crate::proxy::upstream::UpstreamFetcher;
use crate::resolver::{HeuristicResolver, PlayApiResolver, ResolverChain, StreamResolver};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: UpstreamFetcher,
    pub resolver: Arc<dyn StreamResolver>,
    pub prober: MetadataProber,
    pub relay: RelayConfig,
}

/// Failures while assembling the server from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Invalid relay user agent: {0}")]
    UserAgent(#[from] axum::http::header::InvalidHeaderValue),
}

/// HTTP server for the streaming proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()?;

        let fetcher = UpstreamFetcher::new(client.clone(), &config.relay, &config.timeouts)?;
        let prober = MetadataProber::new(client.clone(), &config.relay, &config.timeouts);

        let mut chain = ResolverChain::new();
        if let Some(site) = config.resolver.play_api.clone() {
            chain = chain.with(PlayApiResolver::new(
                client.clone(),
                site,
                &config.resolver,
                &config.timeouts,
            ));
        }
        let chain = chain.with(HeuristicResolver::new(client, &config.resolver, &config.timeouts));

        let state = AppState {
            fetcher,
            resolver: Arc::new(chain),
            prober,
            relay: config.relay.clone(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/api/proxy", get(proxy_handler))
            .route("/proxy", get(proxy_handler))
            .route("/api/resolve", get(resolve_handler))
            .route("/api/metadata", get(metadata_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections));

        if config.cors.enabled {
            router = router.layer(cors_layer(&config.cors));
        }

        router
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            chunk_size = self.config.relay.chunk_size,
            status_policy = ?self.config.relay.status_policy,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}
