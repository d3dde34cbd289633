//! Ad hoc questions answered outside the document workflow.

use crate::agentic::session::{ChatEntry, SessionManager, SessionOperation};
use crate::service::generation::AnswerGenerationService;
use crate::util::errors::{QuillError, QuillResult};
use crate::util::text::truncate_chars;
use chrono::Local;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

pub const TIMEOUT_MESSAGE: &str =
    "Request timed out after 5 minutes. Try breaking your question into smaller parts.";
pub const FAILURE_MESSAGE: &str = "Failed to generate answer. Please try again.";
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Sidebar row for one chat exchange.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistoryItem {
    pub index: usize,
    pub label: String,
    pub success: bool,
    pub time: String,
    pub timestamp: String,
}

pub struct ChatService {
    sessions: Arc<SessionManager>,
    generation: Arc<AnswerGenerationService>,
}

impl ChatService {
    pub fn new(sessions: Arc<SessionManager>, generation: Arc<AnswerGenerationService>) -> Self {
        Self {
            sessions,
            generation,
        }
    }

    /// Answer `question` and append the exchange to the session's history.
    /// Model failures are recorded in the entry rather than returned.
    pub async fn ask(&self, session_id: &str, question: &str) -> QuillResult<ChatEntry> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QuillError::validation(
                "Please enter a question before submitting.",
            ));
        }
        let guard = self.sessions.begin_operation(session_id, SessionOperation::Chat)?;

        let started = Instant::now();
        let result = self.generation.answer_single(question, None).await;
        let elapsed = started.elapsed().as_secs_f64();
        drop(guard);

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let entry = match result {
            Ok(answer) => {
                info!("Ad hoc question answered successfully in {:.1}s", elapsed);
                ChatEntry {
                    question: question.to_string(),
                    timestamp,
                    answer: Some(answer),
                    error: None,
                    generation_time_secs: elapsed,
                }
            }
            Err(e) => {
                warn!(
                    "Ad hoc question failed: question={}, error={}",
                    truncate_chars(question, 50, "..."),
                    e
                );
                let message = if e.is_timeout() {
                    TIMEOUT_MESSAGE
                } else {
                    FAILURE_MESSAGE
                };
                ChatEntry {
                    question: question.to_string(),
                    timestamp,
                    answer: None,
                    error: Some(message.to_string()),
                    generation_time_secs: elapsed,
                }
            }
        };

        self.sessions.push_chat(session_id, entry.clone())?;
        Ok(entry)
    }

    /// Latest `limit` exchanges, newest first.
    pub fn recent(&self, session_id: &str, limit: usize) -> QuillResult<Vec<ChatHistoryItem>> {
        let history = self.sessions.snapshot(session_id)?.chat_history;
        Ok(recent_items(&history, limit))
    }

    pub fn clear_history(&self, session_id: &str) -> QuillResult<()> {
        self.sessions.clear_chat(session_id)
    }

    pub fn transcript(&self, session_id: &str) -> QuillResult<String> {
        let history = self.sessions.snapshot(session_id)?.chat_history;
        Ok(format_transcript(&history))
    }
}

pub fn recent_items(history: &[ChatEntry], limit: usize) -> Vec<ChatHistoryItem> {
    history
        .iter()
        .enumerate()
        .rev()
        .take(limit)
        .map(|(index, entry)| {
            let success = entry.error.is_none();
            let icon = if success { "✅" } else { "❌" };
            let time = match entry.timestamp.split_once(' ') {
                Some((_, clock)) => clock.chars().take(5).collect(),
                None => entry.timestamp.chars().take(10).collect(),
            };
            ChatHistoryItem {
                index,
                label: format!("{} {}", icon, truncate_chars(&entry.question, 50, "...")),
                success,
                time,
                timestamp: entry.timestamp.clone(),
            }
        })
        .collect()
}

/// Plain text copy of the whole history.
pub fn format_transcript(history: &[ChatEntry]) -> String {
    let mut lines = vec!["=== Quill Chat History ===\n".to_string()];
    for (i, entry) in history.iter().enumerate() {
        let n = i + 1;
        lines.push(format!("Q{}: {}", n, entry.question));
        match &entry.error {
            Some(error) => lines.push(format!("A{}: ERROR - {}", n, error)),
            None => lines.push(format!(
                "A{}: {}",
                n,
                entry.answer.as_deref().unwrap_or("No answer")
            )),
        }
        lines.push(format!("Time: {}", entry.timestamp));
        lines.push(String::new());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(question: &str, answer: Option<&str>, error: Option<&str>) -> ChatEntry {
        ChatEntry {
            question: question.to_string(),
            timestamp: "2024-05-01 14:03:59".to_string(),
            answer: answer.map(str::to_string),
            error: error.map(str::to_string),
            generation_time_secs: 1.0,
        }
    }

    #[test]
    fn recent_is_newest_first_and_truncated() {
        let long = "x".repeat(60);
        let history = vec![
            entry("first?", Some("a"), None),
            entry(&long, None, Some(FAILURE_MESSAGE)),
        ];
        let items = recent_items(&history, 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].index, 1);
        assert_eq!(items[0].label, format!("❌ {}...", "x".repeat(50)));
        assert_eq!(items[0].time, "14:03");
        assert_eq!(items[1].label, "✅ first?");
        assert_eq!(recent_items(&history, 1).len(), 1);
    }

    #[test]
    fn transcript_lists_exchanges() {
        let history = vec![
            entry("What is Unity Catalog?", Some("A governance layer."), None),
            entry("Too long?", None, Some(TIMEOUT_MESSAGE)),
        ];
        let text = format_transcript(&history);
        assert!(text.starts_with("=== Quill Chat History ===\n\nQ1: What is Unity Catalog?\n"));
        assert!(text.contains("A1: A governance layer.\nTime: 2024-05-01 14:03:59\n"));
        assert!(text.contains(&format!("A2: ERROR - {}", TIMEOUT_MESSAGE)));
        assert_eq!(format_transcript(&[]), "=== Quill Chat History ===\n");
    }
}
