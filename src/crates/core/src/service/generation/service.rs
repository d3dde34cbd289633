use super::topic_parser::{group_by_topic, parse_topic_response, TopicGroup};
use crate::infrastructure::ai::{CompletionParams, ModelInvoker};
use crate::infrastructure::config::domain::ANSWER_GENERATION_SYSTEM_PROMPT;
use crate::util::errors::{QuillError, QuillResult};
use crate::util::text::truncate_chars;
use crate::util::types::{Answer, GenerationInfo, GenerationMethod, Question};
use log::{error, info, warn};
use quill_ai_adapters::ChatMessage;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Receives `(current, total, status)` before each model call.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize, &str) + Send + Sync);

fn append_custom(mut prompt: String, custom_prompt: Option<&str>) -> String {
    if let Some(custom) = custom_prompt.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("\n\nAdditional context/instructions: {}", custom));
    }
    prompt
}

pub fn build_topic_prompt(topic: &str, question_text: &str, custom_prompt: Option<&str>) -> String {
    append_custom(
        format!(
            "Please answer the following group of related questions about {}:\n\n{}",
            topic, question_text
        ),
        custom_prompt,
    )
}

pub fn build_single_prompt(question_text: &str, custom_prompt: Option<&str>) -> String {
    append_custom(
        format!(
            "Please provide a detailed answer to the following question about our product capabilities:\n\n{}",
            question_text
        ),
        custom_prompt,
    )
}

pub struct AnswerGenerationService {
    invoker: Arc<ModelInvoker>,
}

impl AnswerGenerationService {
    pub fn new(invoker: Arc<ModelInvoker>) -> Self {
        Self { invoker }
    }

    fn model(&self) -> String {
        self.invoker
            .resolve_model(&self.invoker.config().models.answer_generation_model)
    }

    fn messages(&self, user_prompt: String) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if self.invoker.config().api.generation_system_prompt {
            messages.push(ChatMessage::system(ANSWER_GENERATION_SYSTEM_PROMPT));
        }
        messages.push(ChatMessage::user(user_prompt));
        messages
    }

    async fn call(&self, user_prompt: String) -> QuillResult<String> {
        let api = &self.invoker.config().api;
        let params = CompletionParams {
            max_tokens: api.generation_max_tokens,
            temperature: api.temperature,
        };
        let text = self
            .invoker
            .complete(
                &self.model(),
                &self.messages(user_prompt),
                params,
                &api.generation_retry,
            )
            .await?;
        Ok(text.trim().to_string())
    }

    /// Generate answers for `questions`.
    ///
    /// Hierarchical question sets are answered one topic per call; anything
    /// else one question per call. Cancellation is checked before every
    /// call.
    pub async fn generate(
        &self,
        questions: &[Question],
        custom_prompt: Option<&str>,
        progress: ProgressFn<'_>,
        cancel: &CancellationToken,
    ) -> QuillResult<(Vec<Answer>, GenerationInfo)> {
        if questions.is_empty() {
            return Err(QuillError::validation("No questions to answer"));
        }
        if !self.invoker.has_credentials().await {
            error!("No authentication configured - cannot generate answers");
            return Err(QuillError::Authentication(
                "Authentication not configured".to_string(),
            ));
        }

        let started = Instant::now();
        let mut errors = Vec::new();
        let (method, answers) = if questions.iter().all(Question::is_hierarchical) {
            info!("Using topic-based batch processing");
            let answers = self
                .generate_by_topics(questions, custom_prompt, progress, cancel, &mut errors)
                .await?;
            (GenerationMethod::TopicBatch, answers)
        } else {
            info!("Using individual question processing");
            let answers = self
                .generate_individual(questions, custom_prompt, progress, cancel, &mut errors)
                .await?;
            (GenerationMethod::Individual, answers)
        };

        if answers.is_empty() {
            let mut message = "No answers could be generated for the questions".to_string();
            if !errors.is_empty() {
                message.push_str(&format!(": {}", errors.join("; ")));
            }
            error!("{}", message);
            return Err(QuillError::AnswerGeneration(message));
        }

        let info = GenerationInfo {
            questions_processed: questions.len(),
            answers_generated: answers.len(),
            processing_time_secs: started.elapsed().as_secs_f64(),
            method,
            errors,
        };
        info!(
            "Successfully generated {} answers in {:.2} seconds",
            info.answers_generated, info.processing_time_secs
        );
        Ok((answers, info))
    }

    async fn generate_by_topics(
        &self,
        questions: &[Question],
        custom_prompt: Option<&str>,
        progress: ProgressFn<'_>,
        cancel: &CancellationToken,
        errors: &mut Vec<String>,
    ) -> QuillResult<Vec<Answer>> {
        let groups = group_by_topic(questions);
        info!(
            "Grouped {} questions into {} topics",
            questions.len(),
            groups.len()
        );
        let model = self.model();
        let total = groups.len();
        let mut answers = Vec::new();

        for (i, group) in groups.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(QuillError::Cancelled("Answer generation cancelled".to_string()));
            }
            progress(
                i + 1,
                total,
                &format!("Calling {} for topic: {}", model, group.topic),
            );
            if !self.invoker.has_credentials().await {
                error!("Authentication headers are no longer available");
                errors.push("Authentication headers are no longer available".to_string());
                break;
            }

            match self.answer_topic(group, custom_prompt).await {
                Ok(topic_answers) => answers.extend(topic_answers),
                Err(e) => {
                    warn!("Failed to generate answers for topic: topic={}, error={}", group.topic, e);
                    errors.push(format!("Topic {}: {}", group.topic, e));
                }
            }
        }
        Ok(answers)
    }

    async fn answer_topic(
        &self,
        group: &TopicGroup,
        custom_prompt: Option<&str>,
    ) -> QuillResult<Vec<Answer>> {
        let response = self
            .call(build_topic_prompt(&group.topic, &group.text, custom_prompt))
            .await?;
        Ok(parse_topic_response(&response, group))
    }

    async fn generate_individual(
        &self,
        questions: &[Question],
        custom_prompt: Option<&str>,
        progress: ProgressFn<'_>,
        cancel: &CancellationToken,
        errors: &mut Vec<String>,
    ) -> QuillResult<Vec<Answer>> {
        let model = self.model();
        let total = questions.len();
        let mut answers = Vec::with_capacity(total);

        for (idx, question) in questions.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(QuillError::Cancelled("Answer generation cancelled".to_string()));
            }
            let preview: String = question.text.chars().take(50).collect();
            progress(idx + 1, total, &format!("Calling {}: {}...", model, preview));
            if !self.invoker.has_credentials().await {
                error!("Authentication headers are no longer available");
                errors.push("Authentication headers are no longer available".to_string());
                break;
            }

            match self.answer_question(question, custom_prompt).await {
                Ok(answer) => answers.push(answer),
                Err(e) => {
                    warn!(
                        "Failed to generate answer: question_id={}, error={}",
                        question.id, e
                    );
                    errors.push(format!("{}: {}", question.id, e));
                    let id = if question.id.trim().is_empty() {
                        format!("Q{}", idx + 1)
                    } else {
                        question.id.clone()
                    };
                    answers.push(Answer::failed(
                        id,
                        question.text.clone(),
                        question.topic.clone().unwrap_or_else(|| "Unknown".to_string()),
                    ));
                }
            }
        }
        Ok(answers)
    }

    async fn answer_question(
        &self,
        question: &Question,
        custom_prompt: Option<&str>,
    ) -> QuillResult<Answer> {
        let text = self
            .call(build_single_prompt(&question.text, custom_prompt))
            .await?;
        Ok(Answer::generated(
            question.answer_id(),
            question.text.clone(),
            text,
            question.topic.clone().unwrap_or_else(|| "General".to_string()),
        ))
    }

    /// Answer one free-form question with the generation model.
    pub async fn answer_single(&self, question: &str, custom_prompt: Option<&str>) -> QuillResult<String> {
        if !self.invoker.has_credentials().await {
            return Err(QuillError::Authentication(
                "Authentication not configured".to_string(),
            ));
        }
        info!("Answering ad hoc question: {}", truncate_chars(question, 80, "..."));
        self.call(build_single_prompt(question, custom_prompt)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_prompt_lists_questions_and_custom_context() {
        let prompt = build_topic_prompt("Security", "1.01: Encrypt?", Some("Be brief"));
        assert_eq!(
            prompt,
            "Please answer the following group of related questions about Security:\n\n1.01: Encrypt?\n\nAdditional context/instructions: Be brief"
        );
    }

    #[test]
    fn blank_custom_prompt_is_ignored() {
        let prompt = build_single_prompt("What is your uptime SLA?", Some("  "));
        assert!(prompt.ends_with("capabilities:\n\nWhat is your uptime SLA?"));
    }
}
