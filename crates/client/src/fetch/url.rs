//! Target URL resolution for proxied requests.
//!
//! A free-form target is tried, in order, as:
//! 1. an absolute `http`/`https` URL
//! 2. a protocol-relative reference (`//host/...`), given `https:`
//! 3. a bare domain (`example.com/path`), given `https://`

use mirage_core::Error;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

/// Bare domain: starts alphanumeric and has a `label.tld` with a 2+ letter tld.
///
/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static BARE_DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9][\w.-]*\.[a-z]{2,}").unwrap());

/// Error type for URL resolution failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("{0}")]
    Malformed(String),

    #[error("not a URL")]
    NotAUrl,
}

impl From<UrlError> for Error {
    fn from(err: UrlError) -> Self {
        match err {
            UrlError::Empty => Error::MissingParameter("url".into()),
            UrlError::NotAUrl => Error::InvalidUrl(String::new()),
            other => Error::InvalidUrl(other.to_string()),
        }
    }
}

/// An absolute http(s) URL that a page is fetched from.
///
/// Relative references found on the page are resolved against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl(Url);

impl TargetUrl {
    /// Wrap an already-parsed URL, rejecting non-web schemes.
    pub fn from_url(url: Url) -> Result<Self, UrlError> {
        match url.scheme() {
            "http" | "https" if url.has_host() => Ok(Self(url)),
            "http" | "https" => Err(UrlError::Malformed("missing host".into())),
            scheme => Err(UrlError::UnsupportedScheme(scheme.to_string())),
        }
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// `scheme://host[:port]`
    pub fn origin(&self) -> String {
        self.0.origin().ascii_serialization()
    }

    /// Path truncated after its last `/`.
    pub fn directory_path(&self) -> &str {
        let path = self.0.path();
        match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "/",
        }
    }

    /// Value for the injected `<base href>`.
    pub fn base_href(&self) -> String {
        format!("{}{}", self.origin(), self.directory_path())
    }

    /// Canonical string form used for cache keys: the URL without its fragment.
    pub fn normalized(&self) -> String {
        let mut url = self.0.clone();
        url.set_fragment(None);
        url.into()
    }
}

impl fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

fn parse_web(candidate: &str) -> Result<TargetUrl, UrlError> {
    let url = Url::parse(candidate).map_err(|e| UrlError::Malformed(e.to_string()))?;
    TargetUrl::from_url(url)
}

/// Resolve a free-form target string into an absolute URL.
pub fn resolve(raw: &str) -> Result<TargetUrl, UrlError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let direct = Url::parse(trimmed);
    if let Ok(url) = &direct
        && matches!(url.scheme(), "http" | "https")
    {
        return TargetUrl::from_url(url.clone());
    }

    if trimmed.starts_with("//") {
        return parse_web(&format!("https:{trimmed}"));
    }

    if BARE_DOMAIN_RE.is_match(trimmed) {
        return parse_web(&format!("https://{trimmed}"));
    }

    match direct {
        Ok(url) => Err(UrlError::UnsupportedScheme(url.scheme().to_string())),
        Err(_) => Err(UrlError::NotAUrl),
    }
}

/// Resolve `reference` against the page URL.
///
/// Returns `None` when the reference cannot be parsed; callers skip it.
pub fn resolve_relative(reference: &str, base: &TargetUrl) -> Option<Url> {
    base.0.join(reference.trim()).ok()
}
