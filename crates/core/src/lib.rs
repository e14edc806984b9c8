//! Core types and shared functionality for mirage.
//!
//! This crate provides:
//! - In-memory cache store for rendered pages
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheStats, CacheStore, compute_cache_key};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
