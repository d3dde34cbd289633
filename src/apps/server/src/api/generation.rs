//! Background answer generation: start, cancel and the progress stream.

use super::error::ApiResult;
use super::response::{api_response, message_response, Response};
use super::SharedState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{Stream, StreamExt};
use quill_core::agentic::{JobTicket, QuestionSelection};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

pub(super) fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions/:id/generate", post(start_generation))
        .route("/sessions/:id/generate/cancel", post(cancel_generation))
        .route("/sessions/:id/events", get(progress_events))
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    #[serde(default, alias = "custom_prompt")]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

async fn start_generation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Option<Json<GenerateBody>>,
) -> ApiResult<Response<JobTicket>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let selection = QuestionSelection::from_limit(body.limit)?;
    let ticket = state
        .workflow
        .jobs()
        .start_generation(&id, selection, body.custom_prompt)?;
    Ok(api_response(StatusCode::ACCEPTED, ticket))
}

async fn cancel_generation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Response<()>> {
    state.workflow.jobs().cancel(&id)?;
    Ok(message_response(StatusCode::ACCEPTED, "Cancellation requested", None))
}

/// Server-sent events for the session's generation jobs. Each event is named
/// after its kind and carries the JSON-encoded event.
async fn progress_events(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    state.workflow.sessions().snapshot(&id)?;
    let receiver = state.workflow.jobs().subscribe(&id);

    let session_id = id.clone();
    let stream = BroadcastStream::new(receiver).filter_map(move |message| {
        let session_id = session_id.clone();
        async move {
            match message {
                Ok(event) => Some(Event::default().event(event.name()).json_data(&event)),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(session_id = %session_id, skipped, "progress subscriber lagged");
                    None
                }
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
