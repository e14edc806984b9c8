//! `/api/extensions`: run extensions over a caller-supplied document.

use axum::Json;
use axum::extract::Query;
use mirage_client::{ContentPipeline, ExtensionPipeline, TransformContext, parse_names, split_names};
use mirage_core::Error;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;

/// Characters of the result echoed back.
const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ExtensionsParams {
    /// Comma-separated extension names, applied in order.
    pub ext: Option<String>,

    pub html: Option<String>,
}

/// Sizes are in bytes.
#[derive(Debug, Serialize)]
pub struct ExtensionsOutput {
    /// Names as requested, unknown ones included.
    pub extensions: Vec<String>,
    pub original: usize,
    pub result: usize,
    /// Negative when extensions added content.
    pub removed: i64,
    /// Start of the transformed document followed by `...`.
    pub html: String,
}

pub async fn extensions(Query(params): Query<ExtensionsParams>) -> ApiResult<Json<ExtensionsOutput>> {
    let html = params
        .html
        .filter(|html| !html.is_empty())
        .ok_or_else(|| Error::MissingParameter("html".into()))?;

    let names = split_names(params.ext.as_deref().unwrap_or_default());
    if names.is_empty() {
        return Err(Error::MissingParameter("ext".into()).into());
    }

    let result = ExtensionPipeline::new().apply(&html, &parse_names(&names), TransformContext::default())?;

    let original = html.len();
    let size = result.len();
    let mut preview: String = result.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");

    Ok(Json(ExtensionsOutput {
        extensions: names,
        original,
        result: size,
        removed: original as i64 - size as i64,
        html: preview,
    }))
}
