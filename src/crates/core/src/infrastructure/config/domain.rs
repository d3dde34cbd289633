//! Static domain settings: branding, prompts, model catalog and messages.

pub const APP_TITLE: &str = "Quill - Financial Services Intelligent Assistant";
pub const APP_DESCRIPTION: &str = "AI-powered tool for regulatory compliance and reporting";
pub const DOMAIN_NAME: &str = "Financial Services";
pub const DOMAIN_DESCRIPTION: &str = "Intelligent Assistant for Financial Services";

pub const DEFAULT_HOST: &str = "http://e2-demo-field-eng.cloud.databricks.com";
pub const DEFAULT_EXTRACTION_MODEL: &str = "databricks-claude-3-7-sonnet";
pub const DEFAULT_GENERATION_MODEL: &str = "databricks-claude-3-7-sonnet";
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 50;
pub const DEFAULT_SESSION_TIMEOUT_HOURS: u64 = 24;

/// Display name to serving endpoint name.
pub const AVAILABLE_MODELS: [(&str, &str); 4] = [
    ("Claude 3.5 Sonnet", "databricks-claude-3-5-sonnet"),
    ("Claude 3 Sonnet", "databricks-claude-3-sonnet"),
    ("Claude 3 Haiku", "databricks-claude-3-haiku"),
    ("Claude 3.7 Sonnet", "databricks-claude-3-7-sonnet"),
];

pub const QUESTION_EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an expert assistant for rewriting complex forms into structured, numbered questions.
Your task is to convert a set of interrelated subquestions into clearly numbered and grouped questions
using hierarchical numbering (e.g., 1.0, 1.1) and topic-based organization.

Step 1: Thematic Categorization
Before rewriting, analyze the set of subquestions and identify logical groupings. Categorize each sub-question into
the most appropriate group. Use context clues and key phrases to determine what the question is about.
If a question starts discussing a new category, always start a new topic.

Step 2: Structured Rewriting
Once categorized, rewrite the questions following these rules:
1. Each category becomes a new numbered section.
2. Number the questions in order:
   • 1: Main question, often preceded by a number
   • 1.1, 1.2, 1.3, etc.: Follow-up questions
3. Disambiguate vague references: Replace pronouns like "this" or "it" with clear references to the capability.
   • ❌ "Do we have derivatives exposures?"
   • ✅ "Do we have derivatives exposures (OTC or exchange-traded) requiring transaction and counterparty reporting under EMIR (EU)?"
4. Preserve the original intent and detail of each question. Only rewrite to clarify or resolve ambiguity.
5. If the question expects a specific type of answer (e.g., "Options:", "max 500 characters"), include
   that instruction at the end of the question.
6. Any answer options listed after the question should be included as part of the question.
7. OUTPUT ONLY valid JSON. No extra text, no markdown, no preambles, no explanations.
8. IMPORTANT:
   - ONLY extract questions that actually exist in the provided document
   - If no questions are found, return an empty JSON array: []
   - NEVER invent or hallucinate questions that aren't in the original text
   - Do not use the example above as a template for content, only for format
9. Example output structure:
[
  {
    "question": "1",
    "sub_topics": [
      {
        "topic": "Synthetic Data Generation",
        "sub_questions": [
          {
            "sub_question": "1.01",
            "text": "Does your platform support synthetic data generation?"
          },
          {
            "sub_question": "1.02",
            "text": "How is synthetic data generation supported in your platform?"
          }
        ]
      },
      {
        "topic": "AI-Based Recommendation",
        "sub_questions": [
          {
            "sub_question": "1.03",
            "text": "Does your platform support AI-based recommendations?"
          }
        ]
      }
    ]
  },
  {
    "question": "2",
    "sub_topics": [
      {
        "topic": "Data Augmentation",
        "sub_questions": [
          {
            "sub_question": "2.01",
            "text": "Does your platform support data augmentation?"
          }
        ]
      }
    ]
  }
]"#;

pub const ANSWER_GENERATION_SYSTEM_PROMPT: &str = r#"You are an AI assistant expert on regulatory requirements and reporting for
financial institutions.

Your task is to generate informative, concise, and accurate responses to questions about
regulatory requirements.

Follow these specific guidelines:
- Focus on providing direct answers based only on the information provided.
- Use confident, professional language focusing on strengths without overselling
- Be truthful and accurate about our capabilities
- Use clear, structured responses with bullet points where appropriate
- Format using Markdown for clear structure"#;

pub const DEFAULT_CUSTOM_PROMPT: &str = "If a question doesn't ask how or for details, answer in one sentence. If a question includes options, answer by selecting an option.";

/// Resolve a display name from [`AVAILABLE_MODELS`] to its endpoint name.
/// Unknown names are assumed to already be endpoint names.
pub fn resolve_model_name(name: &str) -> String {
    let trimmed = name.trim();
    AVAILABLE_MODELS
        .iter()
        .find(|(display, _)| *display == trimmed)
        .map(|(_, endpoint)| endpoint.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

pub mod messages {
    pub const EXTRACTION_FAILED: &str = "Failed to extract questions from the document.";
    pub const GENERATION_FAILED: &str = "Failed to generate answers for the questions.";
    pub const AUTH_ERROR: &str = "Authentication failed. Please check your credentials.";
    pub const TIMEOUT_ERROR: &str = "Request timed out. Please try again.";
    pub const NO_FILE_UPLOADED: &str =
        "No file has been uploaded yet. Please upload a file in Step 1 first.";
    pub const NO_QUESTIONS_AVAILABLE: &str =
        "No questions have been extracted yet. Please complete Step 2 first.";
    pub const NO_ANSWERS_AVAILABLE: &str =
        "No answers have been generated yet. Please complete the previous steps first.";
    pub const UPLOAD_SUCCESS: &str = "File uploaded successfully!";
    pub const PROCESSING_COMPLETE: &str = "Processing completed successfully!";

    pub fn unsupported_file_type(ext: &str) -> String {
        format!(
            "Unsupported file type: {}. Please upload a CSV or HTML file.",
            ext
        )
    }

    pub fn file_too_large(max_mb: u64) -> String {
        format!("File size exceeds maximum allowed size of {}MB.", max_mb)
    }

    pub fn questions_extracted(count: usize) -> String {
        format!("Successfully extracted {} questions from the document!", count)
    }

    pub fn answers_generated(count: usize) -> String {
        format!("Successfully generated {} answers!", count)
    }
}
