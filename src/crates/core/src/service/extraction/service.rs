use super::parser::{into_questions, parse_extraction_response, questions_from_prefixed_lines};
use crate::infrastructure::ai::{CompletionParams, ModelInvoker};
use crate::infrastructure::config::domain::QUESTION_EXTRACTION_SYSTEM_PROMPT;
use crate::service::document::html::html_to_text;
use crate::service::document::PreparedDocument;
use crate::util::errors::{QuillError, QuillResult};
use crate::util::types::{ExtractionInfo, ExtractionMethod, Question};
use log::{error, info};
use quill_ai_adapters::ChatMessage;
use std::sync::Arc;
use std::time::Instant;

pub fn build_user_prompt(content: &str, custom_prompt: Option<&str>) -> String {
    let mut prompt = format!(
        "Please extract and structure questions from the following content:\n\n{}",
        content
    );
    if let Some(custom) = custom_prompt.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("\n\nAdditional instructions: {}", custom));
    }
    prompt
}

pub struct QuestionExtractionService {
    invoker: Arc<ModelInvoker>,
}

impl QuestionExtractionService {
    pub fn new(invoker: Arc<ModelInvoker>) -> Self {
        Self { invoker }
    }

    /// Extract questions from a prepared document.
    ///
    /// CSV content is read line by line; HTML is sent to the extraction
    /// model (`model` overrides the configured one and may be a display
    /// name).
    pub async fn extract(
        &self,
        prepared: &PreparedDocument,
        custom_prompt: Option<&str>,
        model: Option<&str>,
    ) -> QuillResult<(Vec<Question>, ExtractionInfo)> {
        let method = prepared
            .method
            .filter(|_| prepared.errors.is_empty())
            .ok_or_else(|| {
                QuillError::file(format!(
                    "Document is not ready for extraction: {}",
                    prepared.errors.join("; ")
                ))
            })?;

        let model_used = self.invoker.resolve_model(
            model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(&self.invoker.config().models.question_extraction_model),
        );
        let started = Instant::now();

        let questions = match method {
            ExtractionMethod::CsvDirect => {
                let questions = questions_from_prefixed_lines(&prepared.content);
                info!("Extracted {} questions from CSV content", questions.len());
                questions
            }
            ExtractionMethod::AiExtraction => {
                self.extract_with_model(&prepared.content, custom_prompt, &model_used)
                    .await?
            }
        };

        if questions.is_empty() {
            return Err(QuillError::QuestionExtraction(
                "No questions were found in the document".to_string(),
            ));
        }

        let info = ExtractionInfo {
            method,
            questions_found: questions.len(),
            processing_time_secs: started.elapsed().as_secs_f64(),
            errors: Vec::new(),
            model_used: match method {
                ExtractionMethod::AiExtraction => Some(model_used),
                ExtractionMethod::CsvDirect => None,
            },
        };
        info!(
            "Successfully extracted {} questions using {:?}",
            info.questions_found, method
        );
        Ok((questions, info))
    }

    async fn extract_with_model(
        &self,
        html: &str,
        custom_prompt: Option<&str>,
        model: &str,
    ) -> QuillResult<Vec<Question>> {
        if !self.invoker.has_credentials().await {
            error!("No authentication configured - cannot perform AI extraction");
            return Err(QuillError::Authentication(
                "No authentication configured - cannot perform AI extraction".to_string(),
            ));
        }

        let text = html_to_text(html);
        info!("Preprocessed HTML: {} -> {} characters", html.len(), text.len());

        let messages = vec![
            ChatMessage::system(QUESTION_EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(&text, custom_prompt)),
        ];
        let api = &self.invoker.config().api;
        let params = CompletionParams {
            max_tokens: api.extraction_max_tokens,
            temperature: api.temperature,
        };

        let response = self
            .invoker
            .complete_with_extended_retry(
                model,
                &messages,
                params,
                &api.extraction_retry,
                &api.extraction_extended_retry,
            )
            .await?;

        let parsed = parse_extraction_response(&response)?;
        if parsed.is_empty() {
            error!("Extraction call succeeded but no questions were parsed from the response");
        }
        Ok(into_questions(parsed))
    }
}
