//! Workflow session state
//!
//! One session per user walking through upload, extraction, generation and
//! download.

pub mod manager;
pub mod types;

pub use manager::{AnswerUpdate, OperationGuard, SessionDefaults, SessionManager};
pub use types::{ChatEntry, SessionOperation, StepStatus, WorkflowSession};
