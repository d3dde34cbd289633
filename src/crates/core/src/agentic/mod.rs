//! Agentic layer - workflow sessions, background generation jobs and ad hoc
//! chat

pub mod chat;
pub mod jobs;
pub mod session;
pub mod workflow;

pub use chat::{ChatHistoryItem, ChatService};
pub use jobs::{JobRunner, JobTicket, QuestionSelection};
pub use session::{
    AnswerUpdate, ChatEntry, SessionManager, SessionOperation, StepStatus, WorkflowSession,
};
pub use workflow::{ExportOutcome, ExtractionOutcome, ExtractionRequest, QuillWorkflow};
