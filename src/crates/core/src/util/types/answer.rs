use serde::{Deserialize, Serialize};

pub const FAILED_ANSWER_TEXT: &str = "Error: Failed to generate answer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    #[default]
    Generated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub question_text: String,
    pub answer: String,
    pub topic: String,
    #[serde(default)]
    pub status: AnswerStatus,
}

impl Answer {
    pub fn generated(
        question_id: impl Into<String>,
        question_text: impl Into<String>,
        answer: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            question_text: question_text.into(),
            answer: answer.into(),
            topic: topic.into(),
            status: AnswerStatus::Generated,
        }
    }

    pub fn failed(
        question_id: impl Into<String>,
        question_text: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            question_text: question_text.into(),
            answer: FAILED_ANSWER_TEXT.to_string(),
            topic: topic.into(),
            status: AnswerStatus::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == AnswerStatus::Failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    TopicBatch,
    Individual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationInfo {
    pub questions_processed: usize,
    pub answers_generated: usize,
    pub processing_time_secs: f64,
    pub method: GenerationMethod,
    #[serde(default)]
    pub errors: Vec<String>,
}
