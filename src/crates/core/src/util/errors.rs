//! Unified error type for the core library.

use quill_ai_adapters::InvocationError;

const DETAIL_BODY_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum QuillError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("File processing error: {0}")]
    FileProcessing(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Question extraction failed: {0}")]
    QuestionExtraction(String),

    #[error("Answer generation failed: {0}")]
    AnswerGeneration(String),

    #[error("Model invocation failed: {message}")]
    ModelInvocation { status: Option<u16>, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type QuillResult<T> = Result<T, QuillError>;

impl QuillError {
    pub fn validation(msg: impl Into<String>) -> Self {
        QuillError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        QuillError::NotFound(msg.into())
    }

    pub fn file(msg: impl Into<String>) -> Self {
        QuillError::FileProcessing(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, QuillError::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, QuillError::Cancelled(_))
    }
}

impl From<InvocationError> for QuillError {
    fn from(error: InvocationError) -> Self {
        match error {
            InvocationError::Timeout(secs) => {
                QuillError::Timeout(format!("Model call timed out after {}s", secs))
            }
            InvocationError::InvalidRequest(msg) => QuillError::Validation(msg),
            other => {
                let status = other.status_code();
                let mut message = other.to_string();
                if message.chars().count() > DETAIL_BODY_CHARS + 64 {
                    message = message.chars().take(DETAIL_BODY_CHARS + 64).collect();
                }
                QuillError::ModelInvocation { status, message }
            }
        }
    }
}

impl From<serde_json::Error> for QuillError {
    fn from(error: serde_json::Error) -> Self {
        QuillError::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_invocation_errors() {
        let err: QuillError = InvocationError::Timeout(300).into();
        assert!(err.is_timeout());

        let err: QuillError = InvocationError::Status {
            status: 400,
            body: "bad".to_string(),
        }
        .into();
        match err {
            QuillError::ModelInvocation { status, message } => {
                assert_eq!(status, Some(400));
                assert!(message.contains("bad"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
