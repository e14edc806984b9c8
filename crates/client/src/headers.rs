//! Response header policy.
//!
//! Rendered HTML always gets a permissive content security policy and frame
//! option so the page works when embedded by the proxy's client. Relayed
//! responses keep upstream headers minus the ones that would block framing,
//! minus hop-by-hop headers, and optionally minus headers that leak server
//! details.

use reqwest::header::{CONTENT_SECURITY_POLICY, HeaderMap, HeaderValue, X_FRAME_OPTIONS};

/// Content security policy set on rendered HTML.
pub const PERMISSIVE_CSP: &str = "default-src * 'unsafe-inline' 'unsafe-eval' data: blob:;";

/// `X-Frame-Options` value set on rendered HTML.
pub const FRAME_OPTIONS_ALLOW_ALL: &str = "ALLOWALL";

/// Headers that would stop the page from rendering inside the proxy.
const BLOCKING_HEADERS: [&str; 3] = ["content-security-policy", "x-frame-options", "x-xss-protection"];

/// Connection-scoped headers; the server frames relayed bodies itself.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Headers that reveal or set server-side state.
const DANGEROUS_HEADERS: [&str; 4] = ["set-cookie", "server", "x-powered-by", "x-aspnet-version"];

/// Which upstream headers survive and which are forced.
#[derive(Debug, Clone, Default)]
pub struct HeaderPolicy {
    strip_dangerous: bool,
    preserve: Vec<String>,
}

impl HeaderPolicy {
    /// Policy that only removes blocking and hop-by-hop headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that also removes dangerous headers, except those in `preserve`.
    pub fn strict<S: AsRef<str>>(preserve: &[S]) -> Self {
        Self {
            strip_dangerous: true,
            preserve: preserve.iter().map(|name| name.as_ref().trim().to_ascii_lowercase()).collect(),
        }
    }

    pub fn strips_dangerous(&self) -> bool {
        self.strip_dangerous
    }

    /// Force the framing-friendly headers onto a rendered HTML response.
    pub fn apply_html(&self, headers: &mut HeaderMap) {
        headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static(PERMISSIVE_CSP));
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static(FRAME_OPTIONS_ALLOW_ALL));
    }

    /// Copy upstream headers onto a relayed response.
    pub fn filter_passthrough(&self, upstream: &HeaderMap) -> HeaderMap {
        let filtered = strip_blocking(upstream);
        if self.strip_dangerous { strip_dangerous(&filtered, &self.preserve) } else { filtered }
    }
}

/// Upstream headers without blocking and hop-by-hop headers. Multi-valued headers keep every value.
pub fn strip_blocking(upstream: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if BLOCKING_HEADERS.contains(&name.as_str()) || HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

/// Headers without `set-cookie`, `server`, `x-powered-by` and `x-aspnet-version`,
/// except those named in `preserve` (lowercase).
pub fn strip_dangerous<S: AsRef<str>>(headers: &HeaderMap, preserve: &[S]) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let keep = !DANGEROUS_HEADERS.contains(&name.as_str())
            || preserve.iter().any(|kept| kept.as_ref().eq_ignore_ascii_case(name.as_str()));
        if keep {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, SET_COOKIE, TRANSFER_ENCODING, X_XSS_PROTECTION};

    fn upstream() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        headers.insert(CONTENT_SECURITY_POLICY, HeaderValue::from_static("default-src 'self'"));
        headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert("server", HeaderValue::from_static("nginx"));
        headers.append(SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(SET_COOKIE, HeaderValue::from_static("b=2"));
        headers
    }

    #[test]
    fn test_apply_html_overrides_upstream() {
        let mut headers = upstream();
        HeaderPolicy::new().apply_html(&mut headers);
        assert_eq!(headers.get(CONTENT_SECURITY_POLICY).unwrap(), PERMISSIVE_CSP);
        assert_eq!(headers.get(X_FRAME_OPTIONS).unwrap(), "ALLOWALL");
        assert_eq!(headers.get_all(CONTENT_SECURITY_POLICY).iter().count(), 1);
    }

    #[test]
    fn test_passthrough_default_policy() {
        let out = HeaderPolicy::new().filter_passthrough(&upstream());
        assert!(out.get(CONTENT_SECURITY_POLICY).is_none());
        assert!(out.get(X_FRAME_OPTIONS).is_none());
        assert!(out.get(X_XSS_PROTECTION).is_none());
        assert!(out.get(TRANSFER_ENCODING).is_none());
        assert_eq!(out.get(CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(out.get("server").unwrap(), "nginx");
        assert_eq!(out.get_all(SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_passthrough_strict_policy() {
        let policy = HeaderPolicy::strict(&["Set-Cookie"]);
        assert!(policy.strips_dangerous());

        let out = policy.filter_passthrough(&upstream());
        assert!(out.get("server").is_none());
        assert_eq!(out.get_all(SET_COOKIE).iter().count(), 2);
        assert_eq!(out.get(CONTENT_TYPE).unwrap(), "image/png");
    }

    #[test]
    fn test_strip_dangerous() {
        let mut headers = HeaderMap::new();
        headers.insert("x-powered-by", HeaderValue::from_static("PHP"));
        headers.insert("x-aspnet-version", HeaderValue::from_static("4.0"));
        headers.insert("cache-control", HeaderValue::from_static("no-cache"));

        let out = strip_dangerous::<&str>(&headers, &[]);
        assert_eq!(out.len(), 1);
        assert!(out.contains_key("cache-control"));
    }
}
