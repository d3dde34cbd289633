use super::types::{ChatEntry, SessionOperation, StepStatus, WorkflowSession};
use crate::infrastructure::events::now_millis;
use crate::infrastructure::storage::SessionStorage;
use crate::util::errors::{QuillError, QuillResult};
use crate::util::types::{
    Answer, ExtractionInfo, GenerationInfo, ProcessingStep, Question, UploadedDocument,
};
use dashmap::DashMap;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Values a fresh session starts with.
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub extraction_model: String,
    pub custom_prompt: String,
}

/// Edit of a single answer row from the review table.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerUpdate {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

/// Marks an operation as running until dropped.
///
/// The flag is cleared on every exit path, including a dropped request
/// future or a panicking job.
#[must_use = "the operation ends as soon as the guard is dropped"]
pub struct OperationGuard {
    sessions: Arc<SessionManager>,
    session_id: String,
    op: SessionOperation,
}

impl std::fmt::Debug for OperationGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationGuard")
            .field("session_id", &self.session_id)
            .field("op", &self.op)
            .finish_non_exhaustive()
    }
}

impl OperationGuard {
    pub fn operation(&self) -> SessionOperation {
        self.op
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.sessions.end_operation(&self.session_id, self.op);
    }
}

fn busy_error(action: &str, running: SessionOperation) -> QuillError {
    QuillError::Conflict(format!(
        "Cannot {} while {} is in progress",
        action,
        running.label()
    ))
}

/// In-memory workflow sessions, each with a scratch directory.
pub struct SessionManager {
    sessions: DashMap<String, WorkflowSession>,
    storage: SessionStorage,
    defaults: SessionDefaults,
}

impl SessionManager {
    pub fn new(storage: SessionStorage, defaults: SessionDefaults) -> Self {
        Self {
            sessions: DashMap::new(),
            storage,
            defaults,
        }
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn fresh(&self, session_id: &str) -> WorkflowSession {
        WorkflowSession::new(
            session_id,
            self.defaults.extraction_model.clone(),
            self.defaults.custom_prompt.clone(),
            now_millis(),
        )
    }

    fn not_found(session_id: &str) -> QuillError {
        QuillError::not_found(format!("Session not found: {}", session_id))
    }

    /// Apply `f` to the session in place and bump its update time.
    fn update<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut WorkflowSession) -> QuillResult<R>,
    ) -> QuillResult<R> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Self::not_found(session_id))?;
        let result = f(&mut session)?;
        session.updated_at_ms = now_millis();
        Ok(result)
    }

    pub fn create(&self) -> QuillResult<WorkflowSession> {
        let session_id = format!("session-{}", uuid::Uuid::new_v4());
        self.storage.create(&session_id)?;
        let session = self.fresh(&session_id);
        self.sessions.insert(session_id.clone(), session.clone());
        info!("Session created: session_id={}", session_id);
        Ok(session)
    }

    pub fn snapshot(&self, session_id: &str) -> QuillResult<WorkflowSession> {
        self.sessions
            .get(session_id)
            .map(|s| s.clone())
            .ok_or_else(|| Self::not_found(session_id))
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn scratch_dir(&self, session_id: &str) -> QuillResult<PathBuf> {
        if !self.contains(session_id) {
            return Err(Self::not_found(session_id));
        }
        Ok(self.storage.session_dir(session_id))
    }

    pub fn delete(&self, session_id: &str) -> QuillResult<()> {
        self.sessions
            .remove(session_id)
            .ok_or_else(|| Self::not_found(session_id))?;
        self.storage.remove(session_id);
        info!("Session deleted: session_id={}", session_id);
        Ok(())
    }

    /// Reset the session to a fresh state and recreate its scratch directory.
    pub fn clear(&self, session_id: &str) -> QuillResult<WorkflowSession> {
        let fresh = self.fresh(session_id);
        let created_at = self.update(session_id, |s| {
            if let Some(op) = s.operation_in_progress() {
                return Err(busy_error("reset", op));
            }
            Ok(s.created_at_ms)
        })?;
        self.storage.remove(session_id);
        self.storage.create(session_id)?;
        let mut session = fresh;
        session.created_at_ms = created_at;
        self.sessions.insert(session_id.to_string(), session.clone());
        info!("Session state cleared: session_id={}", session_id);
        Ok(session)
    }

    /// Go back to `step`, discarding the work of that step and later ones.
    pub fn reset_to_step(&self, session_id: &str, step: ProcessingStep) -> QuillResult<WorkflowSession> {
        if step == ProcessingStep::Upload {
            return self.clear(session_id);
        }
        self.update(session_id, |s| {
            if let Some(op) = s.operation_in_progress() {
                return Err(busy_error("reset", op));
            }
            match step {
                ProcessingStep::Upload => {}
                ProcessingStep::Extract => s.clear_extraction(),
                ProcessingStep::Generate => s.clear_generation(),
                ProcessingStep::Download => s.clear_export(),
            }
            s.current_step = step;
            Ok(())
        })?;
        info!(
            "Session reset to step: session_id={}, step={}",
            session_id,
            step.label()
        );
        self.snapshot(session_id)
    }

    /// Move to `step` if its prerequisites are met.
    pub fn set_current_step(&self, session_id: &str, step: ProcessingStep) -> QuillResult<WorkflowSession> {
        self.update(session_id, |s| {
            let missing = match step {
                ProcessingStep::Upload => None,
                ProcessingStep::Extract if s.document.is_none() => {
                    Some("Please upload a document first")
                }
                ProcessingStep::Generate if s.questions.is_empty() => {
                    Some("No questions available. Please extract questions first.")
                }
                ProcessingStep::Download if s.answers.is_empty() => {
                    Some("No answers available. Please generate answers first.")
                }
                _ => None,
            };
            if let Some(msg) = missing {
                return Err(QuillError::validation(msg));
            }
            s.current_step = step;
            Ok(())
        })?;
        debug!("Step changed: session_id={}, step={}", session_id, step.number());
        self.snapshot(session_id)
    }

    /// Fails with `Conflict` while an operation runs on the session.
    pub fn ensure_idle(&self, session_id: &str, action: &str) -> QuillResult<()> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Self::not_found(session_id))?;
        match session.operation_in_progress() {
            Some(op) => Err(busy_error(action, op)),
            None => Ok(()),
        }
    }

    /// Record a new upload. Earlier questions and answers no longer apply.
    pub fn set_document(&self, session_id: &str, document: UploadedDocument) -> QuillResult<()> {
        self.update(session_id, |s| {
            if let Some(op) = s.operation_in_progress() {
                return Err(busy_error("upload a document", op));
            }
            info!(
                "Document info set: session_id={}, name={}, file={}",
                session_id, document.name, document.file_name
            );
            s.clear_extraction();
            s.document = Some(document);
            Ok(())
        })
    }

    pub fn set_questions(
        &self,
        session_id: &str,
        questions: Vec<Question>,
        info: Option<ExtractionInfo>,
    ) -> QuillResult<()> {
        self.update(session_id, |s| {
            info!(
                "Questions set: session_id={}, count={}",
                session_id,
                questions.len()
            );
            s.clear_generation();
            s.questions = questions;
            s.extraction_info = info;
            s.extraction_complete = true;
            Ok(())
        })
    }

    /// Replace the question list with an edited one.
    pub fn update_questions(&self, session_id: &str, questions: Vec<Question>) -> QuillResult<()> {
        for q in &questions {
            q.validate()?;
        }
        self.update(session_id, |s| {
            if s.generation_in_progress {
                return Err(QuillError::Conflict(
                    "Cannot edit questions while answer generation is in progress".to_string(),
                ));
            }
            s.questions = questions;
            s.extraction_complete = !s.questions.is_empty();
            Ok(())
        })
    }

    pub fn set_answers(
        &self,
        session_id: &str,
        answers: Vec<Answer>,
        info: Option<GenerationInfo>,
        execution_time_secs: Option<f64>,
    ) -> QuillResult<()> {
        self.update(session_id, |s| {
            info!(
                "Generated answers set: session_id={}, count={}",
                session_id,
                answers.len()
            );
            s.answers = answers;
            s.generation_info = info;
            s.execution_time_secs = execution_time_secs;
            s.generation_complete = true;
            s.clear_export();
            Ok(())
        })
    }

    pub fn update_answer(
        &self,
        session_id: &str,
        question_id: &str,
        update: AnswerUpdate,
    ) -> QuillResult<Answer> {
        self.update(session_id, |s| {
            let answer = s
                .answers
                .iter_mut()
                .find(|a| a.question_id == question_id)
                .ok_or_else(|| QuillError::not_found(format!("Answer not found: {}", question_id)))?;
            if let Some(text) = update.answer {
                answer.answer = text;
            }
            if let Some(topic) = update.topic {
                answer.topic = topic;
            }
            Ok(answer.clone())
        })
    }

    pub fn set_custom_prompt(&self, session_id: &str, prompt: impl Into<String>) -> QuillResult<()> {
        let prompt = prompt.into();
        self.update(session_id, |s| {
            s.custom_prompt = prompt;
            Ok(())
        })
    }

    pub fn set_custom_extraction_prompt(
        &self,
        session_id: &str,
        prompt: impl Into<String>,
    ) -> QuillResult<()> {
        let prompt = prompt.into();
        self.update(session_id, |s| {
            s.custom_extraction_prompt = prompt;
            Ok(())
        })
    }

    pub fn set_selected_extraction_model(
        &self,
        session_id: &str,
        model: impl Into<String>,
    ) -> QuillResult<()> {
        let model = model.into();
        self.update(session_id, |s| {
            s.selected_extraction_model = model;
            Ok(())
        })
    }

    pub fn set_export_file_name(&self, session_id: &str, name: impl Into<String>) -> QuillResult<()> {
        let name = name.into();
        self.update(session_id, |s| {
            s.export_file_name = Some(name);
            Ok(())
        })
    }

    pub fn step_status(&self, session_id: &str) -> QuillResult<StepStatus> {
        Ok(self.snapshot(session_id)?.step_status())
    }

    /// Mark `op` as running until the returned guard is dropped. Fails with
    /// `Conflict` while any operation runs.
    pub fn begin_operation(
        self: &Arc<Self>,
        session_id: &str,
        op: SessionOperation,
    ) -> QuillResult<OperationGuard> {
        self.update(session_id, |s| {
            if let Some(running) = s.operation_in_progress() {
                return Err(busy_error(&format!("start {}", op.label()), running));
            }
            s.set_in_progress(op, true);
            Ok(())
        })?;
        Ok(OperationGuard {
            sessions: self.clone(),
            session_id: session_id.to_string(),
            op,
        })
    }

    /// Clear the running flag. A deleted session is not an error here.
    fn end_operation(&self, session_id: &str, op: SessionOperation) {
        if let Some(mut s) = self.sessions.get_mut(session_id) {
            s.set_in_progress(op, false);
            s.updated_at_ms = now_millis();
        }
    }

    pub fn push_chat(&self, session_id: &str, entry: ChatEntry) -> QuillResult<()> {
        self.update(session_id, |s| {
            s.chat_history.push(entry);
            Ok(())
        })
    }

    pub fn clear_chat(&self, session_id: &str) -> QuillResult<()> {
        self.update(session_id, |s| {
            s.chat_history.clear();
            Ok(())
        })
    }

    /// Remove sessions idle for longer than `max_age`. Sessions with work in
    /// flight are kept.
    pub fn expire_idle(&self, max_age: Duration) -> Vec<String> {
        let cutoff = now_millis() - i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| s.updated_at_ms < cutoff && s.operation_in_progress().is_none())
            .map(|s| s.session_id.clone())
            .collect();

        for id in &expired {
            if self.sessions.remove(id).is_some() {
                self.storage.remove(id);
                warn!("Session expired: session_id={}", id);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::types::FileType;

    fn manager(dir: &std::path::Path) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            SessionStorage::new(dir),
            SessionDefaults {
                extraction_model: "databricks-claude-3-7-sonnet".to_string(),
                custom_prompt: "Be brief".to_string(),
            },
        ))
    }

    fn document() -> UploadedDocument {
        UploadedDocument {
            name: "Bank RFI".to_string(),
            file_name: "rfi.csv".to_string(),
            size: 10,
            file_type: FileType::Csv,
            path: PathBuf::from("/tmp/rfi.csv"),
            uploaded_at_ms: 0,
        }
    }

    fn questions() -> Vec<Question> {
        vec![
            Question::new("Q1", "Do you support SSO?").unwrap(),
            Question::new("Q2", "Where is data stored?").unwrap(),
        ]
    }

    #[test]
    fn create_uses_defaults_and_scratch_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = manager(dir.path());
        let s = sessions.create().unwrap();
        assert!(s.session_id.starts_with("session-"));
        assert_eq!(s.current_step, ProcessingStep::Upload);
        assert_eq!(s.custom_prompt, "Be brief");
        assert!(sessions.scratch_dir(&s.session_id).unwrap().is_dir());

        sessions.delete(&s.session_id).unwrap();
        assert!(matches!(sessions.snapshot(&s.session_id), Err(QuillError::NotFound(_))));
    }

    #[test]
    fn steps_require_prerequisites() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = manager(dir.path());
        let id = sessions.create().unwrap().session_id;

        assert!(sessions.set_current_step(&id, ProcessingStep::Extract).is_err());
        sessions.set_document(&id, document()).unwrap();
        sessions.set_current_step(&id, ProcessingStep::Extract).unwrap();
        assert!(sessions.set_current_step(&id, ProcessingStep::Generate).is_err());

        sessions.set_questions(&id, questions(), None).unwrap();
        let s = sessions.set_current_step(&id, ProcessingStep::Generate).unwrap();
        assert_eq!(s.current_step, ProcessingStep::Generate);
        assert!(sessions.set_current_step(&id, ProcessingStep::Download).is_err());

        let status = sessions.step_status(&id).unwrap();
        assert!(status.upload && status.extract);
        assert!(!status.generate && !status.download);
    }

    #[test]
    fn reset_to_step_clears_later_work() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = manager(dir.path());
        let id = sessions.create().unwrap().session_id;
        sessions.set_document(&id, document()).unwrap();
        sessions.set_questions(&id, questions(), None).unwrap();
        sessions
            .set_answers(
                &id,
                vec![Answer::generated("Q1", "Do you support SSO?", "Yes", "General")],
                None,
                Some(3.0),
            )
            .unwrap();
        sessions.set_export_file_name(&id, "out").unwrap();

        let s = sessions.reset_to_step(&id, ProcessingStep::Download).unwrap();
        assert!(s.export_file_name.is_none());
        assert_eq!(s.answers.len(), 1);

        let s = sessions.reset_to_step(&id, ProcessingStep::Generate).unwrap();
        assert!(s.answers.is_empty() && !s.generation_complete);
        assert_eq!(s.questions.len(), 2);

        let s = sessions.reset_to_step(&id, ProcessingStep::Extract).unwrap();
        assert!(s.questions.is_empty() && s.document.is_some());

        let s = sessions.reset_to_step(&id, ProcessingStep::Upload).unwrap();
        assert!(s.document.is_none());
        assert_eq!(s.current_step, ProcessingStep::Upload);
    }

    #[test]
    fn only_one_operation_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = manager(dir.path());
        let id = sessions.create().unwrap().session_id;
        sessions.set_document(&id, document()).unwrap();
        sessions.set_questions(&id, questions(), None).unwrap();

        let guard = sessions.begin_operation(&id, SessionOperation::Generation).unwrap();
        assert_eq!(guard.operation(), SessionOperation::Generation);
        let err = sessions
            .begin_operation(&id, SessionOperation::Chat)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Conflict: Cannot start chat while answer generation is in progress"
        );
        assert!(sessions.clear(&id).is_err());
        assert!(matches!(
            sessions.reset_to_step(&id, ProcessingStep::Extract),
            Err(QuillError::Conflict(_))
        ));
        assert!(sessions.set_document(&id, document()).is_err());
        assert!(sessions.ensure_idle(&id, "upload a document").is_err());
        assert_eq!(sessions.snapshot(&id).unwrap().questions.len(), 2);

        drop(guard);
        assert!(!sessions.snapshot(&id).unwrap().generation_in_progress);
        sessions.ensure_idle(&id, "upload a document").unwrap();
        let _chat = sessions.begin_operation(&id, SessionOperation::Chat).unwrap();
        assert!(sessions.snapshot(&id).unwrap().chat_in_progress);
    }

    #[test]
    fn guard_outliving_its_session_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = manager(dir.path());
        let id = sessions.create().unwrap().session_id;
        let guard = sessions.begin_operation(&id, SessionOperation::Extraction).unwrap();
        sessions.delete(&id).unwrap();
        drop(guard);
        assert!(!sessions.contains(&id));
    }

    #[test]
    fn update_answer_edits_text_and_topic() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = manager(dir.path());
        let id = sessions.create().unwrap().session_id;
        sessions
            .set_answers(
                &id,
                vec![Answer::generated("1.01", "Encrypt?", "Yes", "Security")],
                None,
                None,
            )
            .unwrap();

        let updated = sessions
            .update_answer(
                &id,
                "1.01",
                AnswerUpdate {
                    answer: Some("Yes, AES-256.".to_string()),
                    topic: None,
                },
            )
            .unwrap();
        assert_eq!(updated.answer, "Yes, AES-256.");
        assert_eq!(updated.topic, "Security");
        assert!(sessions
            .update_answer(&id, "9.99", AnswerUpdate::default())
            .is_err());
    }

    #[test]
    fn expire_idle_removes_stale_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = manager(dir.path());
        let stale = sessions.create().unwrap().session_id;
        let busy = sessions.create().unwrap().session_id;
        let _guard = sessions.begin_operation(&busy, SessionOperation::Extraction).unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let expired = sessions.expire_idle(Duration::from_millis(5));
        assert_eq!(expired, vec![stale.clone()]);
        assert!(!sessions.contains(&stale));
        assert!(sessions.contains(&busy));
    }
}
