use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SUPPORTED_EXTENSIONS: [&str; 3] = [".csv", ".html", ".htm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Html,
    Htm,
}

impl FileType {
    /// Resolve from a dotted or bare extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Some(FileType::Csv),
            "html" => Some(FileType::Html),
            "htm" => Some(FileType::Htm),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn is_html(&self) -> bool {
        matches!(self, FileType::Html | FileType::Htm)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileType::Csv => "text/csv",
            FileType::Html | FileType::Htm => "text/html",
        }
    }
}

/// Dotted lowercase extension of a file name (`.csv`), or empty.
pub fn dotted_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedDocument {
    /// User supplied document (RFI) name.
    pub name: String,
    pub file_name: String,
    pub size: u64,
    pub file_type: FileType,
    pub path: PathBuf,
    pub uploaded_at_ms: i64,
}
