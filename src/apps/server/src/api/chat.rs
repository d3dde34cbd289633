//! Ad hoc questions outside the document workflow.

use super::error::ApiResult;
use super::response::{message_response, ok, Response};
use super::SharedState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use quill_core::agentic::chat::DEFAULT_RECENT_LIMIT;
use quill_core::agentic::{ChatEntry, ChatHistoryItem};
use serde::{Deserialize, Serialize};

pub(super) fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/sessions/:id/chat",
            post(ask).get(recent_history).delete(clear_history),
        )
        .route("/sessions/:id/chat/transcript", get(transcript))
}

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub question: String,
}

async fn ask(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<AskBody>,
) -> ApiResult<Response<ChatEntry>> {
    let entry = state.workflow.chat().ask(&id, &body.question).await?;
    Ok(ok(entry))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

async fn recent_history(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Response<Vec<ChatHistoryItem>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    Ok(ok(state.workflow.chat().recent(&id, limit)?))
}

async fn clear_history(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Response<()>> {
    state.workflow.chat().clear_history(&id)?;
    Ok(message_response(StatusCode::OK, "Chat history cleared", None))
}

#[derive(Debug, Serialize)]
pub struct Transcript {
    pub transcript: String,
}

async fn transcript(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Response<Transcript>> {
    let transcript = state.workflow.chat().transcript(&id)?;
    Ok(ok(Transcript { transcript }))
}
