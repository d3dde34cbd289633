//! Export download.

use super::error::ApiResult;
use super::SharedState;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use quill_core::ExportFormat;
use serde::Deserialize;

/// Set by the Databricks Apps proxy for the signed-in user.
pub const FORWARDED_EMAIL_HEADER: &str = "x-forwarded-email";
pub const EXPORT_PATH_HEADER: &str = "x-quill-export-path";

pub(super) fn router() -> Router<SharedState> {
    Router::new().route("/sessions/:id/export", get(download_export))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

async fn download_export(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let format = match query.format.as_deref() {
        Some(f) => f.parse::<ExportFormat>()?,
        None => ExportFormat::Csv,
    };
    let user_email = headers
        .get(FORWARDED_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty());

    let outcome = state
        .workflow
        .export(
            &id,
            format,
            query.filename.as_deref().filter(|f| !f.trim().is_empty()),
            user_email,
        )
        .await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static(outcome.file.mime_type()));
    let disposition = format!(
        "attachment; filename=\"{}\"",
        outcome.file.file_name.replace('"', "")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response_headers.insert(CONTENT_DISPOSITION, value);
    }
    if let Some(path) = &outcome.persisted.export_path {
        if let Ok(value) = HeaderValue::from_str(&path.to_string_lossy()) {
            response_headers.insert(HeaderName::from_static(EXPORT_PATH_HEADER), value);
        }
    }

    Ok((response_headers, outcome.file.content).into_response())
}
