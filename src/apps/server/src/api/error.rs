//! Mapping of core errors onto HTTP responses.

use super::response::err_response;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quill_core::QuillError;

#[derive(Debug)]
pub struct ApiError(pub QuillError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError(QuillError::validation(message))
    }

    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

impl From<QuillError> for ApiError {
    fn from(error: QuillError) -> Self {
        ApiError(error)
    }
}

pub fn status_for(error: &QuillError) -> StatusCode {
    match error {
        QuillError::Validation(_) | QuillError::UnsupportedFileType(_) => StatusCode::BAD_REQUEST,
        QuillError::FileProcessing(_) => StatusCode::UNPROCESSABLE_ENTITY,
        QuillError::NotFound(_) => StatusCode::NOT_FOUND,
        QuillError::Conflict(_) | QuillError::Cancelled(_) => StatusCode::CONFLICT,
        QuillError::Authentication(_) => StatusCode::UNAUTHORIZED,
        QuillError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        QuillError::ModelInvocation { .. }
        | QuillError::QuestionExtraction(_)
        | QuillError::AnswerGeneration(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        err_response(status, self.0.to_string()).into_response()
    }
}
