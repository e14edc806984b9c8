//! Per-request proxy pipeline.
//!
//! A request makes exactly one pass: resolve the target, consult the cache,
//! fetch, then either render HTML (rewrite links, run extensions, minify,
//! store) or relay the upstream body untouched. Response decoration happens
//! in [`Orchestrator::respond`] for both branches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::Response;
use mirage_client::fetch::BodyStream;
use mirage_client::{
    AssetKind, ContentPipeline, Extension, ExtensionPipeline, Fetcher, HeaderPolicy, Minifier, TargetUrl,
    TextMinifier, TransformContext, parse_names, resolve, rewrite_links,
};
use mirage_core::{CacheStore, Error, compute_cache_key};

/// Whether the body came from the cache.
pub static X_CACHED: HeaderName = HeaderName::from_static("x-cached");

/// Key under which the rendered page is cached.
pub static X_CACHE_KEY: HeaderName = HeaderName::from_static("x-cache-key");

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// One `/api/proxy` call.
#[derive(Debug, Clone, Default)]
pub struct ProxyRequest {
    /// Free-form target, resolved before anything else happens.
    pub target: String,
    /// Extension names in the order they were requested. Unknown names are skipped.
    pub extensions: Vec<String>,
    /// Skip the cache read. The rendered page is still stored.
    pub no_cache: bool,
    /// The client's own User-Agent.
    pub user_agent: Option<String>,
}

/// What the pipeline produced for a request.
pub enum ProxyOutcome {
    /// A rendered page, fresh or from the cache.
    Html { body: Arc<str>, cached: bool, cache_key: String },
    /// A non-HTML upstream response relayed as a stream.
    Passthrough { status: StatusCode, headers: HeaderMap, body: BodyStream },
}

/// Composes resolver, cache, fetcher, rewriter, pipeline and minifier.
pub struct Orchestrator {
    cache: Arc<CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    pipeline: Arc<dyn ContentPipeline>,
    minifier: Arc<dyn Minifier>,
    headers: HeaderPolicy,
    ttl: Duration,
    max_html_bytes: usize,
    forward_user_agent: bool,
}

impl Orchestrator {
    /// Orchestrator with the default pipeline, text minifier and a 600 second TTL.
    pub fn new(cache: Arc<CacheStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            cache,
            fetcher,
            pipeline: Arc::new(ExtensionPipeline::new()),
            minifier: Arc::new(TextMinifier),
            headers: HeaderPolicy::new(),
            ttl: Duration::from_secs(600),
            max_html_bytes: 10 * 1024 * 1024,
            forward_user_agent: true,
        }
    }

    pub fn with_pipeline(mut self, pipeline: Arc<dyn ContentPipeline>) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_minifier(mut self, minifier: Arc<dyn Minifier>) -> Self {
        self.minifier = minifier;
        self
    }

    pub fn with_header_policy(mut self, headers: HeaderPolicy) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_html_bytes(mut self, max_html_bytes: usize) -> Self {
        self.max_html_bytes = max_html_bytes;
        self
    }

    pub fn with_forward_user_agent(mut self, forward_user_agent: bool) -> Self {
        self.forward_user_agent = forward_user_agent;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Run one request through the pipeline.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyOutcome, Error> {
        let target = resolve(&request.target)?;
        let extensions = parse_names(&request.extensions);
        let ids: Vec<&str> = extensions.iter().map(Extension::as_str).collect();
        let cache_key = compute_cache_key(&target.normalized(), &ids);

        if !request.no_cache
            && let Some(body) = self.cache.get(&cache_key)
        {
            tracing::debug!(url = %target, cache_key = %cache_key, "cache hit");
            return Ok(ProxyOutcome::Html { body, cached: true, cache_key });
        }

        let user_agent = request.user_agent.as_deref().filter(|_| self.forward_user_agent);
        let started = Instant::now();
        let upstream = self.fetcher.fetch(target.as_url(), user_agent).await?;

        if !upstream.is_html() {
            tracing::debug!(
                url = %target,
                status = upstream.status.as_u16(),
                content_type = upstream.content_type.as_deref().unwrap_or(""),
                "relaying non-HTML response"
            );
            return Ok(ProxyOutcome::Passthrough {
                status: upstream.status,
                headers: self.headers.filter_passthrough(&upstream.headers),
                body: upstream.body,
            });
        }

        let status = upstream.status;
        let base = TargetUrl::from_url(upstream.final_url.clone()).unwrap_or_else(|_| target.clone());
        let html = upstream.into_text(self.max_html_bytes).await?;
        let fetched_bytes = html.len();

        let rewritten = rewrite_links(&html, &base)?;
        let transformed = self.pipeline.apply(&rewritten, &extensions, TransformContext::for_page(&base))?;
        let body: Arc<str> = Arc::from(self.minifier.minify(AssetKind::Html, &transformed));

        if status.is_success() {
            self.cache.set(cache_key.clone(), Arc::clone(&body), self.ttl);
        } else {
            tracing::debug!(url = %target, status = status.as_u16(), "not caching non-success page");
        }

        tracing::info!(
            url = %target,
            final_url = %base,
            status = status.as_u16(),
            fetched_bytes,
            rendered_bytes = body.len(),
            extensions = extensions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rendered page"
        );

        Ok(ProxyOutcome::Html { body, cached: false, cache_key })
    }

    /// Turn an outcome into a response with the header policy applied.
    pub fn respond(&self, outcome: ProxyOutcome) -> Response {
        match outcome {
            ProxyOutcome::Html { body, cached, cache_key } => {
                let mut response = Response::new(Body::from(body.to_string()));
                let headers = response.headers_mut();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
                headers.insert(
                    X_CACHED.clone(),
                    HeaderValue::from_static(if cached { "true" } else { "false" }),
                );
                if let Ok(value) = HeaderValue::from_str(&cache_key) {
                    headers.insert(X_CACHE_KEY.clone(), value);
                }
                self.headers.apply_html(headers);
                response
            }
            ProxyOutcome::Passthrough { status, headers, body } => {
                let mut response = Response::new(Body::from_stream(body));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use mirage_client::UpstreamResponse;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Fetcher that answers every URL with the same canned response.
    pub(crate) struct FakeFetcher {
        status: StatusCode,
        content_type: Option<&'static str>,
        body: String,
        fail: bool,
        calls: AtomicUsize,
        last_user_agent: Mutex<Option<String>>,
    }

    impl FakeFetcher {
        pub(crate) fn html(body: &str) -> Self {
            Self::with(StatusCode::OK, Some("text/html; charset=UTF-8"), body)
        }

        pub(crate) fn with(status: StatusCode, content_type: Option<&'static str>, body: &str) -> Self {
            Self {
                status,
                content_type,
                body: body.to_string(),
                fail: false,
                calls: AtomicUsize::new(0),
                last_user_agent: Mutex::new(None),
            }
        }

        pub(crate) fn failing() -> Self {
            Self { fail: true, ..Self::html("") }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn last_user_agent(&self) -> Option<String> {
            self.last_user_agent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, url: &Url, user_agent: Option<&str>) -> Result<UpstreamResponse, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user_agent.lock().unwrap() = user_agent.map(str::to_string);

            if self.fail {
                return Err(Error::UpstreamFetch("connection refused".into()));
            }

            let mut headers = HeaderMap::new();
            if let Some(content_type) = self.content_type {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
            headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_static("default-src 'self'"));

            Ok(UpstreamResponse::buffered(url.clone(), self.status, headers, self.body.clone()))
        }
    }

    const PAGE: &str = r#"<html><head><title>t</title></head><body><a href="/next">next</a>   <img src="a.png"></body></html>"#;

    fn orchestrator(fetcher: Arc<FakeFetcher>) -> Orchestrator {
        Orchestrator::new(Arc::new(CacheStore::new()), fetcher)
    }

    fn request(target: &str) -> ProxyRequest {
        ProxyRequest { target: target.to_string(), ..Default::default() }
    }

    async fn body_string(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn html_of(outcome: ProxyOutcome) -> (Arc<str>, bool, String) {
        match outcome {
            ProxyOutcome::Html { body, cached, cache_key } => (body, cached, cache_key),
            ProxyOutcome::Passthrough { .. } => panic!("expected HTML outcome"),
        }
    }

    #[tokio::test]
    async fn test_html_is_rewritten_and_minified() {
        let fetcher = Arc::new(FakeFetcher::html(PAGE));
        let orch = orchestrator(fetcher.clone());

        let (body, cached, _) = html_of(orch.handle(request("https://example.com/docs/page")).await.unwrap());
        assert!(!cached);
        assert!(body.contains(r#"<base href="https://example.com/docs/">"#));
        assert!(body.contains("/api/proxy?url=https%3A%2F%2Fexample.com%2Fnext"));
        assert!(body.contains("/api/proxy?url=https%3A%2F%2Fexample.com%2Fdocs%2Fa.png"));
        assert!(body.contains("</a><img"));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_is_deterministic() {
        let fetcher = Arc::new(FakeFetcher::html(PAGE));
        let orch = orchestrator(fetcher.clone());
        let mut req = request("example.com/docs/page");
        req.extensions = vec!["darkmode".into(), "reader".into()];

        let (first, first_cached, first_key) = html_of(orch.handle(req.clone()).await.unwrap());
        let (second, second_cached, second_key) = html_of(orch.handle(req).await.unwrap());

        assert!(!first_cached);
        assert!(second_cached);
        assert_eq!(first, second);
        assert_eq!(first_key, second_key);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_key_ignores_extension_order_and_unknown_names() {
        let fetcher = Arc::new(FakeFetcher::html(PAGE));
        let orch = orchestrator(fetcher.clone());

        let mut first = request("https://example.com/");
        first.extensions = vec!["reader".into(), "darkmode".into()];
        let mut second = request("https://example.com/#top");
        second.extensions = vec!["darkmode".into(), "turbo".into(), "reader".into()];

        let (_, _, first_key) = html_of(orch.handle(first).await.unwrap());
        let (_, cached, second_key) = html_of(orch.handle(second).await.unwrap());
        assert!(cached);
        assert_eq!(first_key, second_key);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let fetcher = Arc::new(FakeFetcher::html(PAGE));
        let orch = orchestrator(fetcher.clone()).with_ttl(Duration::from_millis(50));

        orch.handle(request("https://example.com/")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        let (_, cached, _) = html_of(orch.handle(request("https://example.com/")).await.unwrap());

        assert!(!cached);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_no_cache_skips_read_but_stores() {
        let fetcher = Arc::new(FakeFetcher::html(PAGE));
        let orch = orchestrator(fetcher.clone());

        orch.handle(request("https://example.com/")).await.unwrap();
        let mut bypass = request("https://example.com/");
        bypass.no_cache = true;
        let (_, cached, _) = html_of(orch.handle(bypass).await.unwrap());
        assert!(!cached);
        assert_eq!(fetcher.calls(), 2);

        let (_, cached, _) = html_of(orch.handle(request("https://example.com/")).await.unwrap());
        assert!(cached);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_success_page_is_not_cached() {
        let fetcher = Arc::new(FakeFetcher::with(StatusCode::NOT_FOUND, Some("text/html"), "<p>gone</p>"));
        let orch = orchestrator(fetcher.clone());

        orch.handle(request("https://example.com/missing")).await.unwrap();
        let (_, cached, _) = html_of(orch.handle(request("https://example.com/missing")).await.unwrap());
        assert!(!cached);
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(orch.cache().stats().key_count, 0);
    }

    #[tokio::test]
    async fn test_passthrough_keeps_status_and_filters_headers() {
        let fetcher = Arc::new(FakeFetcher::with(StatusCode::CREATED, Some("image/png"), "PNGDATA"));
        let orch = orchestrator(fetcher.clone());

        let outcome = orch.handle(request("https://example.com/a.png")).await.unwrap();
        let response = orch.respond(outcome);

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
        assert!(response.headers().get(header::X_FRAME_OPTIONS).is_none());
        assert!(response.headers().get(header::CONTENT_SECURITY_POLICY).is_none());
        assert!(response.headers().get(&X_CACHED).is_none());
        assert_eq!(body_string(response).await, "PNGDATA");
        assert_eq!(orch.cache().stats().key_count, 0);
    }

    #[tokio::test]
    async fn test_html_response_headers() {
        let orch = orchestrator(Arc::new(FakeFetcher::html(PAGE)));

        let outcome = orch.handle(request("https://example.com/")).await.unwrap();
        let response = orch.respond(outcome);
        let headers = response.headers();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), HTML_CONTENT_TYPE);
        assert_eq!(headers.get(&X_CACHED).unwrap(), "false");
        assert_eq!(headers.get(&X_CACHE_KEY).unwrap().len(), 64);
        assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "ALLOWALL");
        assert_eq!(
            headers.get(header::CONTENT_SECURITY_POLICY).unwrap(),
            mirage_client::headers::PERMISSIVE_CSP
        );
    }

    #[tokio::test]
    async fn test_extensions_run_after_link_rewriting() {
        let page = r#"<html><head></head><body><script src="https://cdn.other.net/x.js"></script><script src="/app.js"></script></body></html>"#;
        let orch = orchestrator(Arc::new(FakeFetcher::html(page)));
        let mut req = request("https://example.com/");
        req.extensions = vec!["nothirdparty".into()];

        let (body, _, _) = html_of(orch.handle(req).await.unwrap());
        assert!(!body.contains("cdn.other.net"));
        assert!(body.contains("/api/proxy?url=https%3A%2F%2Fexample.com%2Fapp.js"));
    }

    #[tokio::test]
    async fn test_user_agent_forwarding() {
        let fetcher = Arc::new(FakeFetcher::html(PAGE));
        let orch = orchestrator(fetcher.clone());
        let mut req = request("https://example.com/");
        req.user_agent = Some("Browser/2.0".into());
        orch.handle(req.clone()).await.unwrap();
        assert_eq!(fetcher.last_user_agent().as_deref(), Some("Browser/2.0"));

        let fetcher = Arc::new(FakeFetcher::html(PAGE));
        let orch = orchestrator(fetcher.clone()).with_forward_user_agent(false);
        orch.handle(req).await.unwrap();
        assert_eq!(fetcher.last_user_agent(), None);
    }

    #[tokio::test]
    async fn test_invalid_and_missing_targets() {
        let fetcher = Arc::new(FakeFetcher::html(PAGE));
        let orch = orchestrator(fetcher.clone());

        let err = orch.handle(request("   ")).await.err().unwrap();
        assert_eq!(err.to_string(), "Missing url param");

        let err = orch.handle(request("not a url")).await.err().unwrap();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().starts_with("Invalid URL"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_bad_gateway() {
        let orch = orchestrator(Arc::new(FakeFetcher::failing()));
        let err = orch.handle(request("https://example.com/")).await.err().unwrap();
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.to_string(), "Fetch failed: connection refused");
    }

    #[tokio::test]
    async fn test_oversized_html_is_rejected() {
        let orch = orchestrator(Arc::new(FakeFetcher::html(PAGE))).with_max_html_bytes(16);
        let err = orch.handle(request("https://example.com/")).await.err().unwrap();
        assert_eq!(err.status_code(), 502);
        assert_eq!(orch.cache().stats().key_count, 0);
    }
}
