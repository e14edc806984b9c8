//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (MIRAGE_*)
//! 2. TOML config file (if MIRAGE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::net::SocketAddr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (MIRAGE_*)
/// 2. TOML config file (if MIRAGE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    ///
    /// Set via MIRAGE_HOST environment variable.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server binds to.
    ///
    /// Set via MIRAGE_PORT environment variable.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Lifetime of a rendered page in the cache, in seconds.
    ///
    /// Set via MIRAGE_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Interval of the background expiry sweep, in seconds. Zero disables it.
    ///
    /// Set via MIRAGE_CACHE_SWEEP_SECS environment variable.
    #[serde(default = "default_cache_sweep_secs")]
    pub cache_sweep_secs: u64,

    /// Fallback User-Agent for upstream requests.
    ///
    /// Set via MIRAGE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether the client's own User-Agent is forwarded upstream.
    ///
    /// Set via MIRAGE_FORWARD_USER_AGENT environment variable.
    #[serde(default = "default_true")]
    pub forward_user_agent: bool,

    /// Optional deadline for upstream fetches in milliseconds.
    ///
    /// Set via MIRAGE_FETCH_TIMEOUT_MS environment variable. Unset means no timeout.
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,

    /// Maximum number of redirects followed per fetch.
    ///
    /// Set via MIRAGE_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Maximum HTML body size buffered for rewriting.
    ///
    /// Set via MIRAGE_MAX_HTML_BYTES environment variable.
    #[serde(default = "default_max_html_bytes")]
    pub max_html_bytes: usize,

    /// Whether rendered HTML is minified before caching.
    ///
    /// Set via MIRAGE_MINIFY_HTML environment variable.
    #[serde(default = "default_true")]
    pub minify_html: bool,

    /// Whether the extension pipeline runs at all.
    ///
    /// Set via MIRAGE_EXTENSIONS_ENABLED environment variable.
    #[serde(default = "default_true")]
    pub extensions_enabled: bool,

    /// Strip `set-cookie`, `server` and friends from passthrough responses.
    ///
    /// Set via MIRAGE_STRIP_DANGEROUS_HEADERS environment variable.
    #[serde(default)]
    pub strip_dangerous_headers: bool,

    /// Dangerous headers that survive the strict policy.
    ///
    /// Set via MIRAGE_PRESERVE_HEADERS environment variable.
    #[serde(default)]
    pub preserve_headers: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3000
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_cache_sweep_secs() -> u64 {
    600
}

fn default_user_agent() -> String {
    "Proxy/1.0".into()
}

fn default_max_redirects() -> usize {
    10
}

fn default_max_html_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_sweep_secs: default_cache_sweep_secs(),
            user_agent: default_user_agent(),
            forward_user_agent: true,
            fetch_timeout_ms: None,
            max_redirects: default_max_redirects(),
            max_html_bytes: default_max_html_bytes(),
            minify_html: true,
            extensions_enabled: true,
            strip_dangerous_headers: false,
            preserve_headers: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Sweep period, or `None` when the sweeper is disabled.
    pub fn cache_sweep_interval(&self) -> Option<Duration> {
        (self.cache_sweep_secs > 0).then(|| Duration::from_secs(self.cache_sweep_secs))
    }

    /// Upstream deadline, or `None` for no timeout.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    /// Socket address assembled from `host` and `port`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::Invalid { field: "host".into(), reason: format!("{e}") })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `MIRAGE_`
    /// 2. TOML file from `MIRAGE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("MIRAGE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("MIRAGE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
