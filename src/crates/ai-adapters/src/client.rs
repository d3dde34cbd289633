use crate::types::{ChatCompletionRequest, ChatCompletionResponse};
use log::{debug, trace, warn};
use reqwest::StatusCode;
use std::time::Duration;

const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("Access forbidden (403): {body}")]
    Forbidden { body: String, token_expired: bool },

    #[error("Model serving endpoint unavailable (503): {body}")]
    Unavailable { body: String },

    #[error("API call failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Response contained no choices")]
    EmptyChoices,
}

impl InvocationError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, InvocationError::Unavailable { .. })
    }

    pub fn is_token_expired(&self) -> bool {
        matches!(
            self,
            InvocationError::Forbidden {
                token_expired: true,
                ..
            }
        )
    }

    /// Failures worth retrying with the same request. A timeout already
    /// spent the whole client budget and is reported at once.
    pub fn is_transient(&self) -> bool {
        match self {
            InvocationError::Unavailable { .. } | InvocationError::Transport(_) => true,
            InvocationError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            InvocationError::Forbidden { .. } => Some(403),
            InvocationError::Unavailable { .. } => Some(503),
            InvocationError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Whether a 403 body indicates an expired OAuth/JWT token rather than a
/// missing permission.
pub fn is_expired_token_body(body: &str) -> bool {
    body.contains("ExpiredJwtException")
        || body.contains("JWT expired")
        || body.to_lowercase().contains("token expired")
}

fn preview(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        return body.to_string();
    }
    let mut out: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

/// One-shot HTTP client for model serving endpoints.
///
/// Retries and credential refresh are left to the caller; this type only
/// performs a single POST and classifies the outcome.
#[derive(Debug, Clone)]
pub struct ServingClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl ServingClient {
    pub fn new(timeout: Duration) -> Result<Self, InvocationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InvocationError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn invoke(
        &self,
        url: &str,
        auth_header: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, InvocationError> {
        request.validate().map_err(InvocationError::InvalidRequest)?;

        debug!(
            "Invoking serving endpoint: url={}, messages={}, max_tokens={}",
            url,
            request.messages.len(),
            request.max_tokens
        );

        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, auth_header)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InvocationError::Timeout(self.timeout.as_secs())
                } else {
                    InvocationError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                InvocationError::Timeout(self.timeout.as_secs())
            } else {
                InvocationError::Transport(e.to_string())
            }
        })?;
        trace!("Serving endpoint response: status={}, body={}", status, body);

        match status {
            StatusCode::OK => {
                let parsed: ChatCompletionResponse = serde_json::from_str(&body)
                    .map_err(|e| InvocationError::Decode(e.to_string()))?;
                if parsed.choices.is_empty() {
                    return Err(InvocationError::EmptyChoices);
                }
                Ok(parsed)
            }
            StatusCode::FORBIDDEN => {
                let token_expired = is_expired_token_body(&body);
                warn!(
                    "Serving endpoint returned 403: token_expired={}",
                    token_expired
                );
                Err(InvocationError::Forbidden {
                    body: preview(&body),
                    token_expired,
                })
            }
            StatusCode::SERVICE_UNAVAILABLE => Err(InvocationError::Unavailable {
                body: preview(&body),
            }),
            other => Err(InvocationError::Status {
                status: other.as_u16(),
                body: preview(&body),
            }),
        }
    }
}
