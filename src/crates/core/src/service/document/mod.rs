//! Document intake: validation, preparation for extraction and previews.

pub mod csv;
pub mod html;
pub mod processor;

pub use processor::{
    decode_text, find_question_column, DocumentPreview, DocumentProcessor, PreparedDocument,
    PreviewContent,
};
