//! Session lifecycle and the upload / extract / review steps.

use super::error::{ApiError, ApiResult};
use super::response::{api_response, message_response, ok, Response};
use super::SharedState;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use quill_core::agentic::session::AnswerUpdate;
use quill_core::agentic::workflow::{ExtractionOutcome, ExtractionRequest};
use quill_core::service::document::DocumentPreview;
use quill_core::service::export::ExportSummary;
use quill_core::{Answer, ProcessingStep, Question, UploadedDocument, WorkflowSession};
use serde::Deserialize;

pub(super) fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/reset", post(reset_session))
        .route("/sessions/:id/step", post(change_step))
        .route("/sessions/:id/upload", post(upload_document))
        .route("/sessions/:id/sample", post(load_sample))
        .route("/sessions/:id/preview", get(preview_document))
        .route("/sessions/:id/extract", post(extract_questions))
        .route("/sessions/:id/questions", put(replace_questions))
        .route("/sessions/:id/answers/:question_id", put(update_answer))
        .route("/sessions/:id/summary", get(summary))
}

async fn create_session(State(state): State<SharedState>) -> ApiResult<Response<WorkflowSession>> {
    let session = state.workflow.sessions().create()?;
    Ok(api_response(StatusCode::CREATED, session))
}

async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Response<WorkflowSession>> {
    Ok(ok(state.workflow.sessions().snapshot(&id)?))
}

async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Response<()>> {
    state.workflow.delete_session(&id)?;
    Ok(message_response(StatusCode::OK, "Session deleted", None))
}

async fn reset_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Response<WorkflowSession>> {
    Ok(ok(state.workflow.sessions().clear(&id)?))
}

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub step: ProcessingStep,
    #[serde(default)]
    pub reset: bool,
}

async fn change_step(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<StepRequest>,
) -> ApiResult<Response<WorkflowSession>> {
    let sessions = state.workflow.sessions();
    let session = if request.reset {
        sessions.reset_to_step(&id, request.step)?
    } else {
        sessions.set_current_step(&id, request.step)?
    };
    Ok(ok(session))
}

async fn upload_document(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Response<UploadedDocument>> {
    let mut document_name: Option<String> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid name field: {}", e)))?;
                document_name = Some(text);
            }
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid file field: {}", e)))?;
                upload = Some((file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("Missing multipart field: file"))?;
    let document = state
        .workflow
        .upload(&id, document_name.as_deref().unwrap_or_default(), &file_name, &bytes)
        .await?;
    Ok(api_response(StatusCode::CREATED, document))
}

async fn load_sample(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Response<UploadedDocument>> {
    let document = state.workflow.load_sample(&id).await?;
    Ok(api_response(StatusCode::CREATED, document))
}

async fn preview_document(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Response<DocumentPreview>> {
    Ok(ok(state.workflow.preview(&id).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractBody {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, alias = "custom_prompt")]
    pub custom_prompt: Option<String>,
}

async fn extract_questions(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    body: Option<Json<ExtractBody>>,
) -> ApiResult<Response<ExtractionOutcome>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let outcome = state
        .workflow
        .extract(
            &id,
            ExtractionRequest {
                model: body.model,
                custom_prompt: body.custom_prompt,
            },
        )
        .await?;
    Ok(ok(outcome))
}

#[derive(Debug, Deserialize)]
pub struct QuestionsBody {
    pub questions: Vec<Question>,
}

async fn replace_questions(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<QuestionsBody>,
) -> ApiResult<Response<Vec<Question>>> {
    let sessions = state.workflow.sessions();
    sessions.update_questions(&id, body.questions)?;
    Ok(ok(sessions.snapshot(&id)?.questions))
}

async fn update_answer(
    State(state): State<SharedState>,
    Path((id, question_id)): Path<(String, String)>,
    Json(update): Json<AnswerUpdate>,
) -> ApiResult<Response<Answer>> {
    let answer = state
        .workflow
        .sessions()
        .update_answer(&id, &question_id, update)?;
    Ok(ok(answer))
}

async fn summary(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Response<ExportSummary>> {
    Ok(ok(state.workflow.summary(&id)?))
}
