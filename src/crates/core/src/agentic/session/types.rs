use crate::util::types::{
    Answer, ExtractionInfo, GenerationInfo, ProcessingStep, Question, UploadedDocument,
};
use serde::{Deserialize, Serialize};

/// One ad hoc chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub question: String,
    /// Local time, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub generation_time_secs: f64,
}

impl ChatEntry {
    pub fn is_success(&self) -> bool {
        self.answer.is_some() && self.error.is_none()
    }
}

/// Long-running work a session can have in flight. Only one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOperation {
    Extraction,
    Generation,
    Chat,
}

impl SessionOperation {
    pub fn label(self) -> &'static str {
        match self {
            SessionOperation::Extraction => "question extraction",
            SessionOperation::Generation => "answer generation",
            SessionOperation::Chat => "chat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StepStatus {
    pub upload: bool,
    pub extract: bool,
    pub generate: bool,
    pub download: bool,
}

/// Workflow state of one user session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSession {
    pub session_id: String,
    pub current_step: ProcessingStep,
    pub document: Option<UploadedDocument>,
    pub questions: Vec<Question>,
    pub extraction_complete: bool,
    pub extraction_info: Option<ExtractionInfo>,
    pub selected_extraction_model: String,
    pub custom_extraction_prompt: String,
    pub custom_prompt: String,
    pub answers: Vec<Answer>,
    pub generation_complete: bool,
    pub generation_info: Option<GenerationInfo>,
    pub export_file_name: Option<String>,
    pub execution_time_secs: Option<f64>,
    pub extraction_in_progress: bool,
    pub generation_in_progress: bool,
    pub chat_in_progress: bool,
    pub chat_history: Vec<ChatEntry>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl WorkflowSession {
    pub fn new(
        session_id: impl Into<String>,
        extraction_model: impl Into<String>,
        custom_prompt: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            current_step: ProcessingStep::Upload,
            document: None,
            questions: Vec::new(),
            extraction_complete: false,
            extraction_info: None,
            selected_extraction_model: extraction_model.into(),
            custom_extraction_prompt: String::new(),
            custom_prompt: custom_prompt.into(),
            answers: Vec::new(),
            generation_complete: false,
            generation_info: None,
            export_file_name: None,
            execution_time_secs: None,
            extraction_in_progress: false,
            generation_in_progress: false,
            chat_in_progress: false,
            chat_history: Vec::new(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn step_status(&self) -> StepStatus {
        StepStatus {
            upload: self.document.is_some(),
            extract: self.extraction_complete && !self.questions.is_empty(),
            generate: self.generation_complete && !self.answers.is_empty(),
            download: self.export_file_name.is_some(),
        }
    }

    pub fn operation_in_progress(&self) -> Option<SessionOperation> {
        if self.extraction_in_progress {
            Some(SessionOperation::Extraction)
        } else if self.generation_in_progress {
            Some(SessionOperation::Generation)
        } else if self.chat_in_progress {
            Some(SessionOperation::Chat)
        } else {
            None
        }
    }

    pub(crate) fn set_in_progress(&mut self, op: SessionOperation, value: bool) {
        match op {
            SessionOperation::Extraction => self.extraction_in_progress = value,
            SessionOperation::Generation => self.generation_in_progress = value,
            SessionOperation::Chat => self.chat_in_progress = value,
        }
    }

    pub(crate) fn clear_export(&mut self) {
        self.export_file_name = None;
    }

    pub(crate) fn clear_generation(&mut self) {
        self.answers.clear();
        self.generation_complete = false;
        self.generation_info = None;
        self.execution_time_secs = None;
        self.clear_export();
    }

    pub(crate) fn clear_extraction(&mut self) {
        self.questions.clear();
        self.extraction_complete = false;
        self.extraction_info = None;
        self.clear_generation();
    }
}
