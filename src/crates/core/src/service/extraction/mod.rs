//! Question extraction from prepared documents.

pub mod parser;
pub mod service;

pub use parser::{parse_extraction_response, ParsedQuestion};
pub use service::{build_user_prompt, QuestionExtractionService};
