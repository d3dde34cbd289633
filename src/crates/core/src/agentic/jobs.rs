//! Background answer generation with progress events and cancellation.

use crate::agentic::session::{SessionManager, SessionOperation};
use crate::infrastructure::config::domain::messages;
use crate::infrastructure::events::{now_millis, ProgressEvent, ProgressHub};
use crate::service::generation::AnswerGenerationService;
use crate::util::errors::{QuillError, QuillResult};
use crate::util::types::{ProcessingStep, Question};
use dashmap::DashMap;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Which of the session's questions to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuestionSelection {
    #[default]
    All,
    First(usize),
}

impl QuestionSelection {
    pub fn from_limit(limit: Option<usize>) -> QuillResult<Self> {
        match limit {
            None => Ok(QuestionSelection::All),
            Some(0) => Err(QuillError::validation(
                "Question limit must be at least 1",
            )),
            Some(n) => Ok(QuestionSelection::First(n)),
        }
    }

    pub fn apply(self, questions: &[Question]) -> Vec<Question> {
        match self {
            QuestionSelection::All => questions.to_vec(),
            QuestionSelection::First(n) => questions.iter().take(n).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobTicket {
    pub job_id: String,
    pub session_id: String,
    pub total_questions: usize,
    pub started_at_ms: i64,
}

/// Running job registered under its session id.
struct ActiveJob {
    job_id: String,
    token: CancellationToken,
}

type ActiveJobs = DashMap<String, ActiveJob>;

/// Unregister `job_id` only. A newer job on the same session keeps its entry.
fn unregister(jobs: &ActiveJobs, session_id: &str, job_id: &str) -> bool {
    jobs.remove_if(session_id, |_, job| job.job_id == job_id).is_some()
}

pub struct JobRunner {
    sessions: Arc<SessionManager>,
    generation: Arc<AnswerGenerationService>,
    hub: Arc<ProgressHub>,
    jobs: Arc<ActiveJobs>,
}

impl JobRunner {
    pub fn new(
        sessions: Arc<SessionManager>,
        generation: Arc<AnswerGenerationService>,
        hub: Arc<ProgressHub>,
    ) -> Self {
        Self {
            sessions,
            generation,
            hub,
            jobs: Arc::new(DashMap::new()),
        }
    }

    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ProgressEvent> {
        self.hub.subscribe(session_id)
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.jobs.contains_key(session_id)
    }

    /// Start generating answers in the background. Returns once the job is
    /// registered; results arrive as [`ProgressEvent`]s and in the session.
    pub fn start_generation(
        &self,
        session_id: &str,
        selection: QuestionSelection,
        custom_prompt: Option<String>,
    ) -> QuillResult<JobTicket> {
        let guard = self
            .sessions
            .begin_operation(session_id, SessionOperation::Generation)?;
        let session = self.sessions.snapshot(session_id)?;
        let questions = selection.apply(&session.questions);
        if questions.is_empty() {
            return Err(QuillError::validation(messages::NO_QUESTIONS_AVAILABLE));
        }
        if let Some(prompt) = &custom_prompt {
            self.sessions.set_custom_prompt(session_id, prompt.clone())?;
        }
        let prompt = custom_prompt.unwrap_or(session.custom_prompt);

        let job_id = uuid::Uuid::new_v4().to_string();
        let token = CancellationToken::new();
        self.jobs.insert(
            session_id.to_string(),
            ActiveJob {
                job_id: job_id.clone(),
                token: token.clone(),
            },
        );

        let ticket = JobTicket {
            job_id: job_id.clone(),
            session_id: session_id.to_string(),
            total_questions: questions.len(),
            started_at_ms: now_millis(),
        };
        info!(
            "Generation job started: session_id={}, job_id={}, questions={}",
            session_id,
            job_id,
            questions.len()
        );
        self.hub.emit(
            session_id,
            ProgressEvent::Started {
                total: questions.len(),
                timestamp: ticket.started_at_ms,
            },
        );

        let sessions = self.sessions.clone();
        let generation = self.generation.clone();
        let hub = self.hub.clone();
        let jobs = self.jobs.clone();
        let sid = session_id.to_string();

        tokio::spawn(async move {
            let started = Instant::now();
            let progress_hub = hub.clone();
            let progress_sid = sid.clone();
            let progress = move |current: usize, total: usize, status: &str| {
                progress_hub.emit(
                    &progress_sid,
                    ProgressEvent::Progress {
                        current,
                        total,
                        status: status.to_string(),
                        timestamp: now_millis(),
                    },
                );
            };

            let result = generation
                .generate(&questions, Some(prompt.as_str()), &progress, &token)
                .await;
            let elapsed = started.elapsed().as_secs_f64();

            let event = match result {
                Ok((answers, info)) => {
                    let stored = sessions
                        .set_answers(&sid, answers.clone(), Some(info), Some(elapsed))
                        .and_then(|_| sessions.set_current_step(&sid, ProcessingStep::Generate));
                    match stored {
                        Ok(_) => ProgressEvent::Completed {
                            answers,
                            elapsed_secs: elapsed,
                            timestamp: now_millis(),
                        },
                        Err(e) => {
                            warn!("Failed to store answers: session_id={}, error={}", sid, e);
                            ProgressEvent::Failed {
                                error: e.to_string(),
                                timestamp: now_millis(),
                            }
                        }
                    }
                }
                Err(e) if e.is_cancelled() => {
                    info!("Generation job cancelled: session_id={}", sid);
                    ProgressEvent::Cancelled {
                        timestamp: now_millis(),
                    }
                }
                Err(e) => {
                    error!("Generation job failed: session_id={}, error={}", sid, e);
                    ProgressEvent::Failed {
                        error: e.to_string(),
                        timestamp: now_millis(),
                    }
                }
            };

            // Unregister before the session is marked idle so a job started
            // right after this one keeps its own entry.
            unregister(&jobs, &sid, &job_id);
            drop(guard);
            hub.emit(&sid, event);
            debug!("Generation job finished: session_id={}", sid);
        });

        Ok(ticket)
    }

    /// Drop the session's progress channel once the session is gone.
    pub fn release(&self, session_id: &str) {
        if let Some((_, job)) = self.jobs.remove(session_id) {
            job.token.cancel();
        }
        self.hub.remove(session_id);
    }

    /// Stop the running job before its next model call.
    pub fn cancel(&self, session_id: &str) -> QuillResult<()> {
        let job = self.jobs.get(session_id).ok_or_else(|| {
            QuillError::not_found(format!(
                "No generation job running for session: {}",
                session_id
            ))
        })?;
        info!(
            "Cancelling generation job: session_id={}, job_id={}",
            session_id, job.job_id
        );
        job.token.cancel();
        Ok(())
    }
}
