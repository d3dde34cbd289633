use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

pub type Response<T> = (StatusCode, Json<APIResponse<T>>);

/// Envelope for every JSON body the API returns.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct APIResponse<T: Serialize> {
    pub status: u16,
    pub message: Option<String>,
    pub data: Option<T>,
}

impl<T: Serialize> APIResponse<T> {
    fn new(status: StatusCode, data: Option<T>, message: Option<String>) -> Self {
        Self {
            status: status.as_u16(),
            message,
            data,
        }
    }
}

pub fn api_response<T: Serialize>(status: StatusCode, data: T) -> Response<T> {
    (status, Json(APIResponse::new(status, Some(data), None)))
}

pub fn ok<T: Serialize>(data: T) -> Response<T> {
    api_response(StatusCode::OK, data)
}

pub fn message_response<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: Option<T>,
) -> Response<T> {
    (status, Json(APIResponse::new(status, data, Some(message.into()))))
}

pub fn err_response(status: StatusCode, err: impl Into<String>) -> Response<()> {
    (status, Json(APIResponse::new(status, None, Some(err.into()))))
}
