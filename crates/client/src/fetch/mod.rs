//! Upstream HTTP fetching.
//!
//! ### Requests
//! - One GET per call; redirects followed up to a configured limit
//! - Optional per-request timeout (none by default)
//! - User-Agent taken from the caller, falling back to the configured default
//!
//! ### Responses
//! - The body is exposed as a byte stream so non-HTML content can be relayed
//!   without buffering
//! - HTML bodies are buffered with [`UpstreamResponse::into_text`] under a byte limit

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::time::Duration;

pub use self::url::{TargetUrl, UrlError, resolve, resolve_relative};

use mirage_core::Error;

/// Streaming response body.
pub type BodyStream = BoxStream<'static, Result<Bytes, Error>>;

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent sent when the caller supplies none (default: "Proxy/1.0")
    pub user_agent: String,

    /// Request timeout (default: none)
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 10)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "Proxy/1.0".to_string(), timeout: None, max_redirects: 10 }
    }
}

/// An upstream response whose body has not been read yet.
pub struct UpstreamResponse {
    /// The URL requested
    pub url: Url,
    /// The URL after redirects
    pub final_url: Url,
    pub status: StatusCode,
    /// Raw Content-Type header
    pub content_type: Option<String>,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl UpstreamResponse {
    /// Build a response around an in-memory body.
    pub fn buffered(url: Url, status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let content_type = content_type_of(&headers);
        let body: Bytes = body.into();
        Self {
            final_url: url.clone(),
            url,
            status,
            content_type,
            headers,
            body: stream::once(async move { Ok::<_, Error>(body) }).boxed(),
        }
    }

    /// Whether the upstream declared an HTML body.
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }

    /// Read the whole body as text, failing once it exceeds `limit` bytes.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub async fn into_text(mut self, limit: usize) -> Result<String, Error> {
        if let Some(len) = content_length_of(&self.headers)
            && len > limit
        {
            return Err(Error::UpstreamTooLarge { size: len, limit });
        }

        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk?;
            let size = buf.len() + chunk.len();
            if size > limit {
                return Err(Error::UpstreamTooLarge { size, limit });
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("url", &self.url.as_str())
            .field("final_url", &self.final_url.as_str())
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

fn content_type_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn content_length_of(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Trait for fetching upstream resources.
///
/// Allows swapping the network client out (e.g. for canned responses in tests).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue a GET for `url`, returning once headers have arrived.
    async fn fetch(&self, url: &Url, user_agent: Option<&str>) -> Result<UpstreamResponse, Error>;
}

/// reqwest-backed [`Fetcher`].
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, user_agent: Option<&str>) -> Result<UpstreamResponse, Error> {
        let mut request = self.http.get(url.clone());

        if let Some(ua) = user_agent.filter(|ua| !ua.trim().is_empty()) {
            match HeaderValue::from_str(ua) {
                Ok(value) => request = request.header(header::USER_AGENT, value),
                Err(_) => tracing::debug!("ignoring unrepresentable user agent"),
            }
        }

        let response = request.send().await.map_err(|e| Error::UpstreamFetch(e.to_string()))?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();
        let content_type = content_type_of(&headers);

        tracing::debug!(
            "fetched {} -> {} ({}, {})",
            url,
            final_url,
            status.as_u16(),
            content_type.as_deref().unwrap_or("no content-type")
        );

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::UpstreamFetch(e.to_string())))
            .boxed();

        Ok(UpstreamResponse { url: url.clone(), final_url, status, content_type, headers, body })
    }
}
