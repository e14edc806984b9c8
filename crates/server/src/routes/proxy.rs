//! `/api/proxy`: fetch, rewrite and render a remote page.

use axum::extract::{Query, State};
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use mirage_client::split_names;
use mirage_core::Error;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::handler::AppState;
use crate::orchestrator::ProxyRequest;

/// Query parameters for `/api/proxy`.
#[derive(Debug, Default, Deserialize)]
pub struct ProxyParams {
    /// The page to fetch. Bare domains and `//host` references are accepted.
    pub url: Option<String>,

    /// Comma-separated extension names, applied in order.
    pub ext: Option<String>,

    /// `true` skips the cache read.
    #[serde(rename = "noCache")]
    pub no_cache: Option<String>,
}

pub async fn proxy(
    State(state): State<AppState>, Query(params): Query<ProxyParams>, headers: HeaderMap,
) -> ApiResult<Response> {
    let target = params
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| Error::MissingParameter("url".into()))?;

    let request = ProxyRequest {
        target,
        extensions: split_names(params.ext.as_deref().unwrap_or_default()),
        no_cache: params.no_cache.as_deref() == Some("true"),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    let outcome = state.orchestrator.handle(request).await?;
    Ok(state.orchestrator.respond(outcome))
}

/// Plain `OPTIONS` without CORS request headers.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
