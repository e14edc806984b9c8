//! HTTP router and shared state.
//!
//! This module wires the route handlers to their paths, installs CORS and
//! request tracing, and builds the [`Orchestrator`] from configuration.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::http::{HeaderName, Method};
use axum::routing::get;
use mirage_client::{
    ContentPipeline, ExtensionPipeline, FetchConfig, Fetcher, HeaderPolicy, HttpFetcher, Minifier, NoopMinifier,
    NoopPipeline, TextMinifier,
};
use mirage_core::{AppConfig, CacheStore, Error};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::orchestrator::Orchestrator;
use crate::routes;

/// Request headers a browser may send cross-origin.
const ALLOWED_HEADERS: [&str; 9] = [
    "x-csrf-token",
    "x-requested-with",
    "accept",
    "accept-version",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "x-api-version",
];

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: Instant,
}

impl AppState {
    pub fn cache(&self) -> &Arc<CacheStore> {
        self.orchestrator.cache()
    }

    /// State backed by a real network fetcher.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let fetcher = HttpFetcher::new(FetchConfig {
            user_agent: config.user_agent.clone(),
            timeout: config.fetch_timeout(),
            max_redirects: config.max_redirects,
        })?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// State with an explicit fetcher; the pipeline and minifier are still chosen from `config`.
    pub fn with_fetcher(config: &AppConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let pipeline: Arc<dyn ContentPipeline> =
            if config.extensions_enabled { Arc::new(ExtensionPipeline::new()) } else { Arc::new(NoopPipeline) };
        let minifier: Arc<dyn Minifier> =
            if config.minify_html { Arc::new(TextMinifier) } else { Arc::new(NoopMinifier) };
        let headers = if config.strip_dangerous_headers {
            HeaderPolicy::strict(config.preserve_headers.as_slice())
        } else {
            HeaderPolicy::new()
        };

        tracing::debug!(
            extensions_enabled = config.extensions_enabled,
            minify_html = config.minify_html,
            strip_dangerous_headers = config.strip_dangerous_headers,
            cache_ttl_secs = config.cache_ttl_secs,
            "building proxy pipeline"
        );

        let orchestrator = Orchestrator::new(Arc::new(CacheStore::new()), fetcher)
            .with_pipeline(pipeline)
            .with_minifier(minifier)
            .with_header_policy(headers)
            .with_ttl(config.cache_ttl())
            .with_max_html_bytes(config.max_html_bytes)
            .with_forward_user_agent(config.forward_user_agent);

        Self { orchestrator: Arc::new(orchestrator), started_at: Instant::now() }
    }
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS, Method::PATCH, Method::DELETE, Method::POST, Method::PUT])
        .allow_headers(ALLOWED_HEADERS.map(HeaderName::from_static))
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/proxy", get(routes::proxy::proxy).options(routes::proxy::preflight))
        .route("/api/cache", get(routes::cache::cache))
        .route("/api/compress", get(routes::compress::compress))
        .route("/api/extensions", get(routes::extensions::extensions))
        .route("/api/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors())
        .with_state(state)
}
