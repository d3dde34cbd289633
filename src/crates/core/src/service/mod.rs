//! Service layer - document intake, question extraction, answer generation
//! and export

pub mod document;
pub mod export;
pub mod extraction;
pub mod generation;

pub use document::{DocumentPreview, DocumentProcessor, PreparedDocument};
pub use export::{ExportFormat, ExportSummary, ExportedFile};
pub use extraction::QuestionExtractionService;
pub use generation::AnswerGenerationService;
