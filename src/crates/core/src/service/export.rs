//! Export of reviewed answers as CSV or HTML, plus optional persistence to
//! the volume with a usage tracking record.

use crate::infrastructure::storage::{TrackingRecord, VolumeStore};
use crate::service::document::csv::write_row;
use crate::util::errors::{QuillError, QuillResult};
use crate::util::text::escape_html;
use crate::util::types::Answer;
use chrono::{DateTime, Local, TimeZone};
use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;
use std::str::FromStr;

pub const EXPORT_COLUMNS: [&str; 4] = ["question_id", "question_text", "answer", "topic"];
const DEFAULT_EXPORT_NAME: &str = "quill_export";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Html,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Html => "html",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Html => "text/html",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = QuillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "html" | "htm" => Ok(ExportFormat::Html),
            other => Err(QuillError::validation(format!(
                "Unsupported export format: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub file_name: String,
    pub format: ExportFormat,
    pub content: String,
}

impl ExportedFile {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

fn numeric_key(id: &str) -> Option<f64> {
    id.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Numeric ids first in numeric order, then the rest by id.
pub fn sort_answers(answers: &[Answer]) -> Vec<Answer> {
    let mut sorted = answers.to_vec();
    sorted.sort_by(|a, b| {
        let key = match (numeric_key(&a.question_id), numeric_key(&b.question_id)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        key.then_with(|| a.question_id.cmp(&b.question_id))
    });
    sorted
}

pub fn to_csv(answers: &[Answer]) -> String {
    let mut out = String::new();
    write_row(&mut out, &EXPORT_COLUMNS);
    for a in answers {
        write_row(
            &mut out,
            &[
                a.question_id.as_str(),
                a.question_text.as_str(),
                a.answer.as_str(),
                a.topic.as_str(),
            ],
        );
    }
    out
}

pub fn to_html<Tz: TimeZone>(answers: &[Answer], filename: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut rows = String::new();
    for a in answers {
        rows.push_str(&format!(
            "      <tr>\n        <td>{}</td>\n        <td class=\"question\">{}</td>\n        <td class=\"answer\">{}</td>\n        <td class=\"topic\">{}</td>\n      </tr>\n",
            escape_html(&a.question_id),
            escape_html(&a.question_text),
            escape_html(&a.answer),
            escape_html(&a.topic),
        ));
    }
    let header = EXPORT_COLUMNS
        .iter()
        .map(|c| format!("<th>{}</th>", c))
        .collect::<Vec<_>>()
        .join("");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Quill Export - {title}</title>
  <style>
    body {{ font-family: Arial, sans-serif; margin: 20px; }}
    h1 {{ color: #1976D2; }}
    table {{ border-collapse: collapse; width: 100%; margin-top: 20px; }}
    th, td {{ border: 1px solid #ddd; padding: 12px; text-align: left; }}
    th {{ background-color: #f5f5f5; font-weight: bold; }}
    tr:nth-child(even) {{ background-color: #f9f9f9; }}
    .question {{ background-color: #e3f2fd; }}
    .answer {{ background-color: #fff3e0; }}
    .topic {{ background-color: #e8f5e8; font-weight: bold; }}
  </style>
</head>
<body>
  <h1>Quill Export Results</h1>
  <p><strong>Generated:</strong> {generated}</p>
  <p><strong>Total Questions:</strong> {total}</p>
  <table class="table table-striped" id="results-table">
    <thead>
      <tr>{header}</tr>
    </thead>
    <tbody>
{rows}    </tbody>
  </table>
</body>
</html>
"#,
        title = escape_html(filename),
        generated = now.format("%Y-%m-%d %H:%M:%S"),
        total = answers.len(),
        header = header,
        rows = rows,
    )
}

pub fn default_filename<Tz: TimeZone>(document_name: Option<&str>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let name = document_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_EXPORT_NAME);
    format!("{}_answers_{}", name, now.format("%Y%m%d_%H%M%S"))
}

/// Render sorted answers in `format`. A blank `filename` falls back to
/// [`default_filename`].
pub fn export_answers(
    answers: &[Answer],
    format: ExportFormat,
    filename: Option<&str>,
    document_name: Option<&str>,
) -> QuillResult<ExportedFile> {
    if answers.is_empty() {
        return Err(QuillError::Export("No answers available to export".to_string()));
    }
    let now = Local::now();
    let base = filename
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| {
            f.strip_suffix(&format!(".{}", format.extension()))
                .unwrap_or(f)
                .to_string()
        })
        .unwrap_or_else(|| default_filename(document_name, &now));

    let sorted = sort_answers(answers);
    let content = match format {
        ExportFormat::Csv => to_csv(&sorted),
        ExportFormat::Html => to_html(&sorted, &base, &now),
    };
    Ok(ExportedFile {
        file_name: format!("{}.{}", base, format.extension()),
        format,
        content,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_questions: usize,
    pub topics_covered: usize,
    pub topic_counts: Vec<TopicCount>,
    pub average_answer_length: f64,
    pub failed_answers: usize,
    #[serde(default)]
    pub execution_time_secs: Option<f64>,
}

pub fn summary(answers: &[Answer], execution_time_secs: Option<f64>) -> ExportSummary {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for a in answers {
        *counts.entry(a.topic.as_str()).or_insert(0) += 1;
    }
    let total_len: usize = answers.iter().map(|a| a.answer.chars().count()).sum();
    let average = if answers.is_empty() {
        0.0
    } else {
        total_len as f64 / answers.len() as f64
    };

    ExportSummary {
        total_questions: answers.len(),
        topics_covered: counts.len(),
        topic_counts: counts
            .into_iter()
            .map(|(topic, count)| TopicCount {
                topic: topic.to_string(),
                count,
            })
            .collect(),
        average_answer_length: average,
        failed_answers: answers.iter().filter(|a| a.is_failed()).count(),
        execution_time_secs: execution_time_secs.filter(|t| *t > 0.0),
    }
}

/// What the tracking record needs beyond the exported file.
#[derive(Debug, Clone, Default)]
pub struct ExportContext {
    pub document_name: String,
    pub input_file: String,
    pub execution_time_secs: f64,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistOutcome {
    pub export_path: Option<PathBuf>,
    pub tracking_path: Option<PathBuf>,
}

/// Write the export to the volume and append a tracking record. Tracking
/// failures are logged but do not fail the export.
pub async fn persist_export(
    store: &VolumeStore,
    file: &ExportedFile,
    record_count: usize,
    context: &ExportContext,
) -> QuillResult<PersistOutcome> {
    let export_path = store
        .persist_export(&file.file_name, file.content.as_bytes())
        .await?;
    if export_path.is_none() {
        return Ok(PersistOutcome::default());
    }

    let now = Local::now();
    let record = TrackingRecord {
        document_name: context.document_name.clone(),
        date_processed: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        user_email: context.user_email.clone(),
        input_file: context.input_file.clone(),
        output_file: file.file_name.clone(),
        execution_time_minutes: context.execution_time_secs / 60.0,
        record_count,
        volume_path: store
            .root()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        timezone: now.offset().to_string(),
    };
    let tracking_path = match store.record_tracking(&record).await {
        Ok(path) => path,
        Err(e) => {
            warn!("Failed to record usage tracking: {}", e);
            None
        }
    };
    info!(
        "Export persisted: file={}, records={}",
        file.file_name, record_count
    );
    Ok(PersistOutcome {
        export_path,
        tracking_path,
    })
}
