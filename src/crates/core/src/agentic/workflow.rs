//! Entry point tying the services to workflow sessions.
//!
//! Transports (the HTTP server, tests) hold one [`QuillWorkflow`] and call
//! into it per session.

use crate::agentic::chat::ChatService;
use crate::agentic::jobs::JobRunner;
use crate::agentic::session::{SessionDefaults, SessionManager, SessionOperation};
use crate::infrastructure::ai::ModelInvoker;
use crate::infrastructure::auth::{CredentialProvider, DatabricksCredentials};
use crate::infrastructure::config::domain::messages;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::events::{now_millis, ProgressHub};
use crate::infrastructure::storage::{SessionStorage, VolumeStore};
use crate::service::document::{DocumentPreview, DocumentProcessor};
use crate::service::export::{
    export_answers, persist_export, summary, ExportContext, ExportFormat, ExportSummary,
    ExportedFile, PersistOutcome,
};
use crate::service::extraction::QuestionExtractionService;
use crate::service::generation::AnswerGenerationService;
use crate::util::errors::{QuillError, QuillResult};
use crate::util::types::{
    ExtractionInfo, FileType, ProcessingStep, Question, UploadedDocument,
};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const SAMPLE_QUESTIONS_CSV: &str = include_str!("../../assets/sample-questions.csv");
pub const SAMPLE_DOCUMENT_NAME: &str = "Sample Questions";
pub const SAMPLE_FILE_NAME: &str = "sample-questions.csv";

#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    pub model: Option<String>,
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutcome {
    pub questions: Vec<Question>,
    pub info: ExtractionInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    #[serde(skip)]
    pub file: ExportedFile,
    pub persisted: PersistOutcome,
}

pub struct QuillWorkflow {
    config: Arc<AppConfig>,
    invoker: Arc<ModelInvoker>,
    processor: DocumentProcessor,
    extraction: QuestionExtractionService,
    sessions: Arc<SessionManager>,
    jobs: JobRunner,
    chat: ChatService,
    volume: VolumeStore,
}

impl QuillWorkflow {
    pub fn new(
        config: AppConfig,
        credentials: Arc<dyn CredentialProvider>,
        storage: SessionStorage,
    ) -> QuillResult<Self> {
        let config = Arc::new(config);
        let invoker = Arc::new(ModelInvoker::new(config.clone(), credentials)?);
        let generation = Arc::new(AnswerGenerationService::new(invoker.clone()));
        let sessions = Arc::new(SessionManager::new(
            storage,
            SessionDefaults {
                extraction_model: config.models.question_extraction_model.clone(),
                custom_prompt: crate::infrastructure::config::DEFAULT_CUSTOM_PROMPT.to_string(),
            },
        ));
        let hub = Arc::new(ProgressHub::new());

        Ok(Self {
            processor: DocumentProcessor::new(config.app.max_file_size_mb),
            extraction: QuestionExtractionService::new(invoker.clone()),
            jobs: JobRunner::new(sessions.clone(), generation.clone(), hub),
            chat: ChatService::new(sessions.clone(), generation),
            volume: VolumeStore::new(
                config.databricks.volume_path.clone(),
                config.tracking.clone(),
            ),
            sessions,
            invoker,
            config,
        })
    }

    /// Build with Databricks credentials and the default scratch root.
    pub fn from_config(config: AppConfig) -> QuillResult<Self> {
        let credentials = Arc::new(DatabricksCredentials::from_settings(&config.databricks)?);
        Self::new(config, credentials, SessionStorage::default())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn invoker(&self) -> &Arc<ModelInvoker> {
        &self.invoker
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn jobs(&self) -> &JobRunner {
        &self.jobs
    }

    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    /// Delete a session, stopping any generation job it still runs.
    pub fn delete_session(&self, session_id: &str) -> QuillResult<()> {
        self.sessions.delete(session_id)?;
        self.jobs.release(session_id);
        Ok(())
    }

    /// Remove idle sessions and their progress channels.
    pub fn expire_idle_sessions(&self, max_age: Duration) -> Vec<String> {
        let expired = self.sessions.expire_idle(max_age);
        for id in &expired {
            self.jobs.release(id);
        }
        expired
    }

    /// Validate and store an uploaded document, then move to extraction.
    pub async fn upload(
        &self,
        session_id: &str,
        document_name: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> QuillResult<UploadedDocument> {
        let errors = self
            .processor
            .validate_upload(document_name, file_name, bytes.len() as u64);
        if !errors.is_empty() {
            return Err(QuillError::validation(errors.join("; ")));
        }
        self.sessions.scratch_dir(session_id)?;
        self.sessions.ensure_idle(session_id, "upload a document")?;

        let path = self
            .sessions
            .storage()
            .save_upload(session_id, file_name, bytes)
            .await?;
        let errors = self.processor.validate_file(&path).await;
        if !errors.is_empty() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove rejected upload: path={}, error={}", path.display(), e);
            }
            return Err(QuillError::validation(errors.join("; ")));
        }
        let file_type = FileType::from_path(&path)
            .ok_or_else(|| QuillError::UnsupportedFileType(file_name.to_string()))?;

        let document = UploadedDocument {
            name: document_name.trim().to_string(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| file_name.to_string()),
            size: bytes.len() as u64,
            file_type,
            path,
            uploaded_at_ms: now_millis(),
        };
        self.sessions.set_document(session_id, document.clone())?;
        self.sessions
            .set_current_step(session_id, ProcessingStep::Extract)?;
        info!("{}: session_id={}, file={}", messages::UPLOAD_SUCCESS, session_id, document.file_name);
        Ok(document)
    }

    /// Load the bundled sample CSV as if it had been uploaded.
    pub async fn load_sample(&self, session_id: &str) -> QuillResult<UploadedDocument> {
        self.upload(
            session_id,
            SAMPLE_DOCUMENT_NAME,
            SAMPLE_FILE_NAME,
            SAMPLE_QUESTIONS_CSV.as_bytes(),
        )
        .await
    }

    pub async fn preview(&self, session_id: &str) -> QuillResult<DocumentPreview> {
        let document = self
            .sessions
            .snapshot(session_id)?
            .document
            .ok_or_else(|| QuillError::validation(messages::NO_FILE_UPLOADED))?;
        self.processor.preview(&document.path).await
    }

    /// Extract questions from the session's document and store them.
    pub async fn extract(
        &self,
        session_id: &str,
        request: ExtractionRequest,
    ) -> QuillResult<ExtractionOutcome> {
        let session = self.sessions.snapshot(session_id)?;
        let document = session
            .document
            .ok_or_else(|| QuillError::validation(messages::NO_FILE_UPLOADED))?;

        let guard = self
            .sessions
            .begin_operation(session_id, SessionOperation::Extraction)?;
        if let Some(model) = request.model.as_deref().filter(|m| !m.trim().is_empty()) {
            self.sessions
                .set_selected_extraction_model(session_id, model)?;
        }
        if let Some(prompt) = &request.custom_prompt {
            self.sessions
                .set_custom_extraction_prompt(session_id, prompt.clone())?;
        }
        let model = request
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(session.selected_extraction_model);
        let custom_prompt = request
            .custom_prompt
            .unwrap_or(session.custom_extraction_prompt);

        let prepared = self.processor.prepare_for_extraction(&document.path).await;
        let result = self
            .extraction
            .extract(&prepared, Some(custom_prompt.as_str()), Some(model.as_str()))
            .await;
        drop(guard);

        let (questions, info) = result?;
        self.sessions
            .set_questions(session_id, questions.clone(), Some(info.clone()))?;
        info!(
            "{}: session_id={}",
            messages::questions_extracted(questions.len()),
            session_id
        );
        Ok(ExtractionOutcome { questions, info })
    }

    pub fn summary(&self, session_id: &str) -> QuillResult<ExportSummary> {
        let session = self.sessions.snapshot(session_id)?;
        if session.answers.is_empty() {
            return Err(QuillError::validation(messages::NO_ANSWERS_AVAILABLE));
        }
        Ok(summary(&session.answers, session.execution_time_secs))
    }

    /// Render the session's answers and persist them to the volume when one
    /// is configured.
    pub async fn export(
        &self,
        session_id: &str,
        format: ExportFormat,
        filename: Option<&str>,
        user_email: Option<&str>,
    ) -> QuillResult<ExportOutcome> {
        let session = self.sessions.snapshot(session_id)?;
        if session.answers.is_empty() {
            return Err(QuillError::validation(messages::NO_ANSWERS_AVAILABLE));
        }
        let document_name = session.document.as_ref().map(|d| d.name.as_str());
        let file = export_answers(&session.answers, format, filename, document_name)?;

        let context = ExportContext {
            document_name: document_name.unwrap_or_default().to_string(),
            input_file: session
                .document
                .as_ref()
                .map(|d| d.file_name.clone())
                .unwrap_or_default(),
            execution_time_secs: session.execution_time_secs.unwrap_or_default(),
            user_email: user_email.map(str::to_string),
        };
        let record_count = session.answers.len();
        let persisted = match persist_export(&self.volume, &file, record_count, &context).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Export not persisted to volume: {}", e);
                PersistOutcome::default()
            }
        };

        self.sessions
            .set_export_file_name(session_id, file.file_name.clone())?;
        self.sessions
            .set_current_step(session_id, ProcessingStep::Download)?;
        Ok(ExportOutcome { file, persisted })
    }
}
