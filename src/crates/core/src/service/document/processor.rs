use super::csv::parse_csv;
use crate::infrastructure::config::domain::messages;
use crate::util::errors::{QuillError, QuillResult};
use crate::util::text::escape_html;
use crate::util::types::{dotted_extension, ExtractionMethod, FileType, SUPPORTED_EXTENSIONS};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::Path;

const QUESTION_COLUMN_KEYWORDS: [&str; 5] = ["question", "questions", "query", "queries", "q"];
const PREVIEW_ROWS: usize = 5;

/// Content ready to be handed to question extraction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedDocument {
    pub file_type: Option<FileType>,
    pub method: Option<ExtractionMethod>,
    pub content: String,
    pub question_column: Option<String>,
    pub file_name: String,
    pub size_bytes: u64,
    pub errors: Vec<String>,
}

impl PreparedDocument {
    fn empty(path: &Path, size_bytes: u64) -> Self {
        Self {
            file_type: FileType::from_path(path),
            method: None,
            content: String::new(),
            question_column: None,
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size_bytes,
            errors: Vec::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.errors.is_empty() && self.method.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PreviewContent {
    Csv {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        total_rows: usize,
        total_columns: usize,
    },
    Html {
        /// Escaped document, suitable for an iframe `srcdoc` attribute.
        srcdoc: String,
        length: usize,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPreview {
    pub file_name: String,
    pub size_kb: f64,
    pub content: PreviewContent,
}

/// Decode as UTF-8, falling back to Latin-1 byte-for-byte.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

pub struct DocumentProcessor {
    max_file_size_mb: u64,
}

impl DocumentProcessor {
    pub fn new(max_file_size_mb: u64) -> Self {
        Self { max_file_size_mb }
    }

    fn max_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Checks an upload before anything is written to disk.
    pub fn validate_upload(&self, document_name: &str, file_name: &str, size: u64) -> Vec<String> {
        let mut errors = Vec::new();
        if document_name.trim().is_empty() {
            errors.push("Please enter a document name".to_string());
        }
        let ext = dotted_extension(file_name);
        if FileType::from_extension(&ext).is_none() {
            let shown = if ext.is_empty() { file_name.to_string() } else { ext };
            errors.push(messages::unsupported_file_type(&shown));
        }
        if size > self.max_bytes() {
            errors.push(messages::file_too_large(self.max_file_size_mb));
        }
        if size == 0 {
            errors.push("Uploaded file is empty".to_string());
        }
        errors
    }

    /// Checks a stored file: extension, size and that it can be opened.
    pub async fn validate_file(&self, path: &Path) -> Vec<String> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta,
            _ => return vec![format!("File not found: {}", path.display())],
        };

        let mut errors = Vec::new();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        if FileType::from_extension(&ext).is_none() {
            errors.push(format!(
                "Unsupported file type: {}. Supported types: {}",
                ext,
                SUPPORTED_EXTENSIONS.join(", ")
            ));
        }

        if meta.len() > self.max_bytes() {
            let size_mb = meta.len() as f64 / (1024.0 * 1024.0);
            errors.push(format!(
                "File too large: {:.1}MB. Maximum size: {}MB",
                size_mb, self.max_file_size_mb
            ));
        }

        if let Err(e) = tokio::fs::File::open(path).await {
            errors.push(format!("File read error: {}", e));
        }

        errors
    }

    pub async fn read_text(&self, path: &Path) -> QuillResult<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| QuillError::file(format!("File read error: {}: {}", path.display(), e)))?;
        Ok(decode_text(&bytes))
    }

    pub async fn prepare_for_extraction(&self, path: &Path) -> PreparedDocument {
        let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
        let mut prepared = PreparedDocument::empty(path, size);

        let errors = self.validate_file(path).await;
        if !errors.is_empty() {
            warn!("Document failed validation: path={}, errors={:?}", path.display(), errors);
            prepared.errors = errors;
            return prepared;
        }

        let content = match self.read_text(path).await {
            Ok(c) => c,
            Err(e) => {
                prepared.errors.push(format!("Preparation error: {}", e));
                return prepared;
            }
        };

        match prepared.file_type {
            Some(FileType::Csv) => self.prepare_csv(&content, &mut prepared),
            Some(_) => {
                prepared.method = Some(ExtractionMethod::AiExtraction);
                info!("HTML prepared: {} characters ready for AI extraction", content.len());
                prepared.content = content;
            }
            None => prepared
                .errors
                .push("Unsupported file type for extraction".to_string()),
        }

        prepared
    }

    fn prepare_csv(&self, content: &str, prepared: &mut PreparedDocument) {
        prepared.method = Some(ExtractionMethod::CsvDirect);
        let table = parse_csv(content);

        let Some(index) = find_question_column(&table.headers) else {
            prepared.method = None;
            prepared.errors.push("No question columns found in CSV file".to_string());
            return;
        };
        let column = table.headers[index].clone();

        let questions: Vec<String> = table
            .column(index)
            .into_iter()
            .map(|q| q.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|q| !q.is_empty())
            .collect();

        prepared.content = questions
            .iter()
            .enumerate()
            .map(|(i, q)| format!("Q{}: {}", i + 1, q))
            .collect::<Vec<_>>()
            .join("\n");
        info!(
            "CSV prepared: {} questions from column '{}'",
            questions.len(),
            column
        );
        prepared.question_column = Some(column);
    }

    pub async fn preview(&self, path: &Path) -> QuillResult<DocumentPreview> {
        let file_type = FileType::from_path(path)
            .ok_or_else(|| QuillError::UnsupportedFileType(dotted_extension(&path.to_string_lossy())))?;
        let size = tokio::fs::metadata(path).await?.len();
        let content = self.read_text(path).await?;
        debug!("Building preview: path={}, size={}", path.display(), size);

        let preview = match file_type {
            FileType::Csv => {
                let table = parse_csv(&content);
                PreviewContent::Csv {
                    total_rows: table.rows.len(),
                    total_columns: table.headers.len(),
                    rows: table.rows.into_iter().take(PREVIEW_ROWS).collect(),
                    headers: table.headers,
                }
            }
            FileType::Html | FileType::Htm => PreviewContent::Html {
                length: content.len(),
                srcdoc: escape_html(&content),
            },
        };

        Ok(DocumentPreview {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            size_kb: (size as f64 / 1024.0 * 10.0).round() / 10.0,
            content: preview,
        })
    }
}

/// First header whose lowercase name contains a question keyword.
pub fn find_question_column(headers: &[String]) -> Option<usize> {
    headers.iter().position(|h| {
        let lower = h.to_lowercase();
        QUESTION_COLUMN_KEYWORDS.iter().any(|k| lower.contains(k))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn validates_missing_unsupported_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let processor = DocumentProcessor::new(1);

        let missing = processor.validate_file(&dir.path().join("nope.csv")).await;
        assert_eq!(missing.len(), 1);
        assert!(missing[0].starts_with("File not found"));

        let xlsx = write(&dir, "book.xlsx", b"x");
        let errors = processor.validate_file(&xlsx).await;
        assert_eq!(
            errors,
            vec!["Unsupported file type: .xlsx. Supported types: .csv, .html, .htm".to_string()]
        );

        let big = write(&dir, "big.csv", &vec![b'a'; 1024 * 1024 + 200 * 1024]);
        let errors = processor.validate_file(&big).await;
        assert_eq!(errors, vec!["File too large: 1.2MB. Maximum size: 1MB".to_string()]);
    }

    #[tokio::test]
    async fn prepares_csv_from_first_question_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "rfi.csv",
            b"ID,Customer Query,Question\n1,\"Do you support\nSSO?\",ignored\n2,,x\n3,Where is data stored?,y\n",
        );
        let prepared = DocumentProcessor::new(50).prepare_for_extraction(&path).await;
        assert!(prepared.is_ready());
        assert_eq!(prepared.method, Some(ExtractionMethod::CsvDirect));
        assert_eq!(prepared.question_column.as_deref(), Some("Customer Query"));
        assert_eq!(prepared.content, "Q1: Do you support SSO?\nQ2: Where is data stored?");
    }

    #[tokio::test]
    async fn csv_without_question_column_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "data.csv", b"Name,Value\nA,1\n");
        let prepared = DocumentProcessor::new(50).prepare_for_extraction(&path).await;
        assert!(!prepared.is_ready());
        assert_eq!(prepared.errors, vec!["No question columns found in CSV file".to_string()]);
    }

    #[tokio::test]
    async fn html_is_passed_through_and_latin1_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "rfi.htm", b"<p>Caf\xe9 question?</p>");
        let prepared = DocumentProcessor::new(50).prepare_for_extraction(&path).await;
        assert!(prepared.is_ready());
        assert_eq!(prepared.method, Some(ExtractionMethod::AiExtraction));
        assert_eq!(prepared.content, "<p>Café question?</p>");
    }

    #[test]
    fn validates_uploads() {
        let processor = DocumentProcessor::new(50);
        assert!(processor.validate_upload("Bank RFI", "rfi.csv", 10).is_empty());

        let errors = processor.validate_upload("  ", "rfi.pdf", 60 * 1024 * 1024);
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&"Unsupported file type: .pdf. Please upload a CSV or HTML file.".to_string()));
        assert!(errors.contains(&"File size exceeds maximum allowed size of 50MB.".to_string()));
    }

    #[tokio::test]
    async fn previews_csv_and_html() {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("Question\n");
        for i in 0..8 {
            csv.push_str(&format!("Q{}?\n", i));
        }
        let path = write(&dir, "q.csv", csv.as_bytes());
        let preview = DocumentProcessor::new(50).preview(&path).await.unwrap();
        match preview.content {
            PreviewContent::Csv { rows, total_rows, total_columns, .. } => {
                assert_eq!(rows.len(), 5);
                assert_eq!(total_rows, 8);
                assert_eq!(total_columns, 1);
            }
            other => panic!("unexpected preview: {:?}", other),
        }

        let path = write(&dir, "q.html", b"<b>\"hi\"</b>");
        let preview = DocumentProcessor::new(50).preview(&path).await.unwrap();
        match preview.content {
            PreviewContent::Html { srcdoc, length } => {
                assert_eq!(srcdoc, "&lt;b&gt;&quot;hi&quot;&lt;/b&gt;");
                assert_eq!(length, 11);
            }
            other => panic!("unexpected preview: {:?}", other),
        }
    }
}
