//! `/api/cache`: inspect and manage rendered pages.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use mirage_core::Error;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::handler::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CacheParams {
    /// `status` (default), `clear` or `delete`.
    pub action: Option<String>,

    /// Entry to remove with `delete`.
    pub key: Option<String>,
}

/// Output of `action=status`.
#[derive(Debug, Serialize)]
pub struct CacheStatus {
    /// Number of live entries.
    pub cached: usize,
    pub keys: Vec<String>,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Serialize)]
pub struct CacheMessage {
    pub message: &'static str,
}

pub async fn cache(State(state): State<AppState>, Query(params): Query<CacheParams>) -> ApiResult<Response> {
    let action = params.action.as_deref().map(str::trim).unwrap_or_default();

    match action {
        "" | "status" => {
            let cache = state.cache();
            let stats = cache.stats();
            let status =
                CacheStatus { cached: stats.key_count, keys: cache.keys(), hits: stats.hits, misses: stats.misses };
            Ok(Json(status).into_response())
        }
        "clear" => {
            state.cache().clear();
            tracing::info!("cache cleared");
            Ok(Json(CacheMessage { message: "Cache cleared" }).into_response())
        }
        "delete" => {
            let key = params
                .key
                .filter(|key| !key.is_empty())
                .ok_or_else(|| Error::MissingParameter("key".into()))?;
            let removed = state.cache().delete(&key);
            tracing::info!(cache_key = %key, removed, "cache entry deleted");
            Ok(Json(CacheMessage { message: "Cache entry deleted" }).into_response())
        }
        _ => Err(Error::UnknownOption("action".into()).into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::handler::tests::{app, app_with, body_json, send};
    use crate::orchestrator::tests::FakeFetcher;

    #[tokio::test]
    async fn test_status_defaults() {
        let response = send(app(), "/api/cache").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "cached": 0, "keys": [], "hits": 0, "misses": 0 }));
    }

    #[tokio::test]
    async fn test_status_counts_hits_and_misses() {
        let (app, _) = app_with(Arc::new(FakeFetcher::html("<p>x</p>")));
        send(app.clone(), "/api/proxy?url=example.com").await;
        send(app.clone(), "/api/proxy?url=example.com").await;

        let json = body_json(send(app, "/api/cache?action=status").await).await;
        assert_eq!(json["cached"], 1);
        assert_eq!(json["hits"], 1);
        assert_eq!(json["misses"], 1);
        assert_eq!(json["keys"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let (app, state) = app_with(Arc::new(FakeFetcher::html("<p>x</p>")));
        state.cache().set("k", "v", Duration::from_secs(60));

        let response = send(app.clone(), "/api/cache?action=clear").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "message": "Cache cleared" }));

        let json = body_json(send(app.clone(), "/api/cache?action=status").await).await;
        assert_eq!(json["cached"], 0);

        let response = send(app, "/api/cache?action=clear").await;
        assert_eq!(body_json(response).await, json!({ "message": "Cache cleared" }));
    }

    #[tokio::test]
    async fn test_delete() {
        let (app, state) = app_with(Arc::new(FakeFetcher::html("<p>x</p>")));
        state.cache().set("k", "v", Duration::from_secs(60));

        let response = send(app.clone(), "/api/cache?action=delete&key=k").await;
        assert_eq!(body_json(response).await, json!({ "message": "Cache entry deleted" }));
        assert!(state.cache().keys().is_empty());

        let response = send(app, "/api/cache?action=delete&key=absent").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_requires_key() {
        let response = send(app(), "/api/cache?action=delete").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Missing key param" }));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let response = send(app(), "/api/cache?action=flush").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Unknown action" }));
    }
}
