use crate::util::errors::{QuillError, QuillResult};
use serde::{Deserialize, Serialize};

/// A single question extracted from a document.
///
/// `question` is the parent question number, `topic` the grouping used for
/// batched answering and `sub_question` the hierarchical id (`1.01`, `2.3`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_question: Option<String>,
    pub text: String,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> QuillResult<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(QuillError::validation("Question text cannot be empty"));
        }
        Ok(Self {
            id: id.into(),
            question: None,
            topic: None,
            sub_question: None,
            text,
        })
    }

    pub fn hierarchical(
        id: impl Into<String>,
        question: impl Into<String>,
        topic: impl Into<String>,
        sub_question: impl Into<String>,
        text: impl Into<String>,
    ) -> QuillResult<Self> {
        let mut q = Self::new(id, text)?;
        q.question = Some(question.into());
        q.topic = Some(topic.into());
        q.sub_question = Some(sub_question.into());
        Ok(q)
    }

    /// True when the question carries the fields needed for topic batching.
    pub fn is_hierarchical(&self) -> bool {
        self.question.is_some() && self.topic.is_some() && self.sub_question.is_some()
    }

    /// Id used for the answer row: sub-question id when present.
    pub fn answer_id(&self) -> String {
        self.sub_question
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| Some(self.id.clone()).filter(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| "Q1".to_string())
    }

    pub fn validate(&self) -> QuillResult<()> {
        if self.text.trim().is_empty() {
            return Err(QuillError::validation(format!(
                "Question {} has empty text",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    CsvDirect,
    AiExtraction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionInfo {
    pub method: ExtractionMethod,
    pub questions_found: usize,
    pub processing_time_secs: f64,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub model_used: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_rejects_empty_text() {
        let q = Question::new("Q1", "  What is your SLA?  ").unwrap();
        assert_eq!(q.text, "What is your SLA?");
        assert!(Question::new("Q2", "   ").is_err());
    }

    #[test]
    fn answer_id_prefers_sub_question() {
        let q = Question::hierarchical("Q1", "1", "Security", "1.2", "Encrypt?").unwrap();
        assert_eq!(q.answer_id(), "1.2");
        assert!(q.is_hierarchical());

        let plain = Question::new("Q7", "Anything?").unwrap();
        assert_eq!(plain.answer_id(), "Q7");
        assert!(!plain.is_hierarchical());

        let mut blank = Question::new("", "Anything?").unwrap();
        blank.sub_question = Some(String::new());
        assert_eq!(blank.answer_id(), "Q1");
    }
}
