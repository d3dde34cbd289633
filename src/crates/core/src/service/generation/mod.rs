//! Answer generation for extracted questions.

pub mod service;
pub mod topic_parser;

pub use service::{build_single_prompt, build_topic_prompt, AnswerGenerationService, ProgressFn};
pub use topic_parser::{group_by_topic, parse_topic_response, TopicGroup};
