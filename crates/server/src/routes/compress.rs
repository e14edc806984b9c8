//! `/api/compress`: minify a caller-supplied HTML, CSS or JS payload.

use axum::Json;
use axum::extract::Query;
use mirage_client::{AssetKind, Minifier, TextMinifier};
use mirage_core::Error;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;

#[derive(Debug, Default, Deserialize)]
pub struct CompressParams {
    /// `html` (default), `css` or `js`.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    pub data: Option<String>,
}

/// Sizes are in bytes.
#[derive(Debug, Serialize)]
pub struct CompressOutput {
    pub original: usize,
    pub compressed: usize,
    pub saved: i64,
    /// Percentage with two decimals, e.g. `"12.50%"`.
    pub ratio: String,
    pub data: String,
}

pub async fn compress(Query(params): Query<CompressParams>) -> ApiResult<Json<CompressOutput>> {
    let data = params
        .data
        .filter(|data| !data.is_empty())
        .ok_or_else(|| Error::MissingParameter("data".into()))?;

    let kind: AssetKind = params
        .kind
        .as_deref()
        .filter(|kind| !kind.is_empty())
        .unwrap_or("html")
        .parse()?;

    let compressed = TextMinifier.minify(kind, &data);

    let original = data.len();
    let size = compressed.len();
    let ratio = (1.0 - size as f64 / original as f64) * 100.0;

    tracing::debug!(kind = kind.as_str(), original, compressed = size, "minified payload");

    Ok(Json(CompressOutput {
        original,
        compressed: size,
        saved: original as i64 - size as i64,
        ratio: format!("{ratio:.2}%"),
        data: compressed,
    }))
}
