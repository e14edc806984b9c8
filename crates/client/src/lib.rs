//! Client code for mirage.
//!
//! This crate provides upstream fetching, URL resolution, link rewriting, the
//! extension pipeline, minification and header policy used by the server.

pub mod extensions;
pub mod fetch;
pub mod headers;
mod html;
pub mod minify;
pub mod rewrite;

pub use extensions::{
    ContentPipeline, Extension, ExtensionPipeline, NoopPipeline, TransformContext, parse_names, split_names,
};
pub use fetch::{
    FetchConfig, Fetcher, HttpFetcher, TargetUrl, UpstreamResponse, UrlError, resolve, resolve_relative,
};
pub use headers::HeaderPolicy;
pub use minify::{AssetKind, Minifier, NoopMinifier, TextMinifier};
pub use rewrite::{PROXY_PATH, proxy_href, rewrite_links, unproxy};
