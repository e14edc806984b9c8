//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Upper bound for the HTML buffering limit.
const MAX_HTML_BYTES_LIMIT: usize = 50 * 1024 * 1024;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `port` or `cache_ttl_secs` is 0
    /// - `max_html_bytes` is 0 or exceeds 50MB
    /// - `fetch_timeout_ms` is set outside 100ms..=5 minutes
    /// - `max_redirects` exceeds 20
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(invalid("port", "must be greater than 0"));
        }

        if self.cache_ttl_secs == 0 {
            return Err(invalid("cache_ttl_secs", "must be greater than 0"));
        }

        if self.max_html_bytes == 0 {
            return Err(invalid("max_html_bytes", "must be greater than 0"));
        }
        if self.max_html_bytes > MAX_HTML_BYTES_LIMIT {
            return Err(invalid("max_html_bytes", "must not exceed 50MB"));
        }

        if let Some(timeout_ms) = self.fetch_timeout_ms {
            if timeout_ms < 100 {
                return Err(invalid("fetch_timeout_ms", "must be at least 100ms"));
            }
            if timeout_ms > 300_000 {
                return Err(invalid("fetch_timeout_ms", "must not exceed 5 minutes (300000ms)"));
            }
        }

        if self.max_redirects > 20 {
            return Err(invalid("max_redirects", "must not exceed 20"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if !self.preserve_headers.is_empty() && !self.strip_dangerous_headers {
            tracing::warn!(
                preserve_count = self.preserve_headers.len(),
                "preserve_headers is set but strip_dangerous_headers is off; \
                 the list has no effect"
            );
        }

        Ok(())
    }
}
