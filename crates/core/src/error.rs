//! Unified error types for mirage.
//!
//! Every variant maps to exactly one HTTP status so the request boundary can
//! render a `{ "error": ... }` envelope without inspecting the message.

/// Unified error types for the proxy pipeline.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A required query parameter was absent or empty.
    #[error("Missing {0} param")]
    MissingParameter(String),

    /// The target could not be resolved to an absolute http(s) URL.
    #[error("Invalid URL{}", detail_suffix(.0))]
    InvalidUrl(String),

    /// An enumerated option (`action`, `type`) had an unrecognized value.
    #[error("Unknown {0}")]
    UnknownOption(String),

    /// Network failure or unreadable upstream response.
    #[error("Fetch failed: {0}")]
    UpstreamFetch(String),

    /// Upstream HTML exceeded the buffering limit.
    #[error("Fetch failed: {size} bytes exceeds {limit}")]
    UpstreamTooLarge { size: usize, limit: usize },

    /// Unexpected failure while transforming or minifying content.
    #[error("{0}")]
    Internal(String),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() { String::new() } else { format!(": {detail}") }
}

impl Error {
    /// HTTP status code this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::MissingParameter(_) | Error::InvalidUrl(_) | Error::UnknownOption(_) => 400,
            Error::UpstreamFetch(_) | Error::UpstreamTooLarge { .. } => 502,
            Error::Internal(_) => 500,
        }
    }

    /// Short machine-readable kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingParameter(_) => "missing_parameter",
            Error::InvalidUrl(_) => "invalid_url",
            Error::UnknownOption(_) => "unknown_option",
            Error::UpstreamFetch(_) | Error::UpstreamTooLarge { .. } => "upstream_fetch_failure",
            Error::Internal(_) => "internal_processing_failure",
        }
    }
}
