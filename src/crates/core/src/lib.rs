// Quill Core Library - RFI/RFP question extraction and answer generation
// Four-layer architecture: Util -> Infrastructure -> Service -> Agentic

pub mod agentic; // Agentic layer - workflow sessions, generation jobs, ad hoc chat
pub mod infrastructure; // Infrastructure layer - config, credentials, model invocation, storage, events
pub mod service; // Service layer - documents, extraction, generation, export
pub mod util; // Utility layer - General types, errors, helper functions

// Export main types
pub use util::errors::*;
pub use util::types::*;

// Export infrastructure components
pub use infrastructure::{
    ai::ModelInvoker,
    config::AppConfig,
    events::{ProgressEvent, ProgressHub},
};

// Export service layer components
pub use service::{
    export::ExportFormat, extraction::QuestionExtractionService,
    generation::AnswerGenerationService,
};

// Export agentic layer core types
pub use agentic::{QuillWorkflow, SessionManager, WorkflowSession};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CORE_NAME: &str = "Quill Core";
