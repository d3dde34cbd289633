//! Parsing of model output into questions.
//!
//! Models are asked for hierarchical JSON but do not always comply, so the
//! parser accepts every shape seen in practice and repairs common JSON
//! mistakes before giving up.

use crate::util::errors::{QuillError, QuillResult};
use crate::util::types::Question;
use log::{debug, warn};
use regex::Regex;
use serde_json::{Map, Value};

const DEFAULT_TOPIC: &str = "General";

/// A question as parsed, before ids are assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuestion {
    pub question: String,
    pub topic: String,
    pub sub_question: String,
    pub text: String,
}

/// Drop a surrounding markdown code fence.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if lines.first().map(|l| l.starts_with("```")).unwrap_or(false) {
        lines.remove(0);
    }
    if lines.last().map(|l| l.trim() == "```").unwrap_or(false) {
        lines.pop();
    }
    lines.join("\n")
}

/// From the first `[` or `{` that has a matching closer later in the text,
/// to the last such closer.
fn json_span(text: &str) -> &str {
    for (start, ch) in text.char_indices() {
        let close = match ch {
            '[' => ']',
            '{' => '}',
            _ => continue,
        };
        if let Some(end) = text.rfind(close) {
            if end > start {
                return &text[start..=end];
            }
        }
    }
    text
}

/// Remove backslashes that do not start a valid JSON escape.
fn drop_invalid_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some('"') | Some('\\') | Some('/') | Some('b') | Some('f') | Some('n')
                | Some('r') | Some('t') | Some('u') => {
                    out.push(c);
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                }
                Some(_) => {}
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn repair_json(text: &str) -> QuillResult<String> {
    let compile = |pattern: &str| {
        Regex::new(pattern)
            .map_err(|e| QuillError::QuestionExtraction(format!("Invalid repair pattern: {}", e)))
    };
    let adjacent_objects = compile(r"\}\s*\{")?;
    let trailing_comma = compile(r",\s*\]")?;

    let cleaned = drop_invalid_escapes(text);
    let cleaned = adjacent_objects.replace_all(&cleaned, "},{");
    let cleaned = trailing_comma.replace_all(&cleaned, "]");
    Ok(cleaned.to_string())
}

fn field_string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_of(obj: &Map<String, Value>) -> String {
    field_string(obj, "text")
        .or_else(|| field_string(obj, "question"))
        .unwrap_or_default()
}

fn parse_list(items: &[Value], out: &mut Vec<ParsedQuestion>) {
    for (i, item) in items.iter().enumerate() {
        let n = i + 1;
        match item {
            Value::String(s) => out.push(ParsedQuestion {
                question: n.to_string(),
                topic: DEFAULT_TOPIC.to_string(),
                sub_question: format!("{}.1", n),
                text: s.clone(),
            }),
            Value::Object(obj) if obj.contains_key("sub_topics") => {
                let parent = field_string(obj, "question").unwrap_or_else(|| n.to_string());
                let sub_topics = obj
                    .get("sub_topics")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let mut k = 0;
                for sub_topic in sub_topics.iter().filter_map(Value::as_object) {
                    let topic =
                        field_string(sub_topic, "topic").unwrap_or_else(|| DEFAULT_TOPIC.to_string());
                    let sub_questions = sub_topic
                        .get("sub_questions")
                        .and_then(Value::as_array)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    for sq in sub_questions.iter().filter_map(Value::as_object) {
                        k += 1;
                        out.push(ParsedQuestion {
                            question: parent.clone(),
                            topic: topic.clone(),
                            sub_question: field_string(sq, "sub_question")
                                .unwrap_or_else(|| format!("{}.{}", parent, k)),
                            text: text_of(sq),
                        });
                    }
                }
            }
            Value::Object(obj) if obj.contains_key("section") && obj.contains_key("questions") => {
                let section =
                    field_string(obj, "section").unwrap_or_else(|| DEFAULT_TOPIC.to_string());
                let questions = obj
                    .get("questions")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                for (j, q) in questions.iter().enumerate() {
                    let fallback_sub = format!("{}.{}", n, j + 1);
                    match q {
                        Value::Object(qobj) => out.push(ParsedQuestion {
                            question: n.to_string(),
                            topic: section.clone(),
                            sub_question: field_string(qobj, "number").unwrap_or(fallback_sub),
                            text: text_of(qobj),
                        }),
                        Value::String(s) => out.push(ParsedQuestion {
                            question: n.to_string(),
                            topic: section.clone(),
                            sub_question: fallback_sub,
                            text: s.clone(),
                        }),
                        _ => {}
                    }
                }
            }
            Value::Object(obj) => out.push(ParsedQuestion {
                question: field_string(obj, "question").unwrap_or_else(|| n.to_string()),
                topic: field_string(obj, "topic").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
                sub_question: field_string(obj, "sub_question")
                    .unwrap_or_else(|| format!("{}.1", n)),
                text: text_of(obj),
            }),
            _ => {}
        }
    }
}

fn parse_object(obj: &Map<String, Value>, out: &mut Vec<ParsedQuestion>) {
    if let Some(list) = obj.get("questions").and_then(Value::as_array) {
        for (i, q) in list.iter().enumerate() {
            let fallback_sub = format!("1.{}", i + 1);
            match q {
                Value::String(s) => out.push(ParsedQuestion {
                    question: "1".to_string(),
                    topic: DEFAULT_TOPIC.to_string(),
                    sub_question: fallback_sub,
                    text: s.clone(),
                }),
                Value::Object(qobj) => out.push(ParsedQuestion {
                    question: field_string(qobj, "question").unwrap_or_else(|| "1".to_string()),
                    topic: field_string(qobj, "topic").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
                    sub_question: field_string(qobj, "sub_question").unwrap_or(fallback_sub),
                    text: text_of(qobj),
                }),
                _ => {}
            }
        }
        return;
    }

    out.push(ParsedQuestion {
        question: field_string(obj, "question").unwrap_or_else(|| "1".to_string()),
        topic: field_string(obj, "topic").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
        sub_question: field_string(obj, "sub_question").unwrap_or_else(|| "1.1".to_string()),
        text: text_of(obj),
    });
}

/// Parse a model response into questions. Entries without text are
/// skipped; an unparseable response is an error.
pub fn parse_extraction_response(response: &str) -> QuillResult<Vec<ParsedQuestion>> {
    let unfenced = strip_code_fence(response);
    let json_text = json_span(&unfenced);

    let value: Value = match serde_json::from_str(json_text) {
        Ok(v) => v,
        Err(first) => {
            warn!("Failed to parse extraction JSON, attempting repair: {}", first);
            let repaired = repair_json(json_text)?;
            serde_json::from_str(&repaired).map_err(|e| {
                QuillError::QuestionExtraction(format!("Model response is not valid JSON: {}", e))
            })?
        }
    };

    let mut parsed = Vec::new();
    match &value {
        Value::Array(items) => parse_list(items, &mut parsed),
        Value::Object(obj) => parse_object(obj, &mut parsed),
        _ => {}
    }

    parsed.retain(|q| !q.text.trim().is_empty());
    debug!("Parsed {} questions from model response", parsed.len());
    Ok(parsed)
}

/// Assign `Q{n}` ids in order.
pub fn into_questions(parsed: Vec<ParsedQuestion>) -> Vec<Question> {
    parsed
        .into_iter()
        .enumerate()
        .filter_map(|(i, p)| {
            Question::hierarchical(format!("Q{}", i + 1), p.question, p.topic, p.sub_question, p.text)
                .ok()
        })
        .collect()
}

/// Lines of `Q{n}: text` (as produced for CSV uploads) into questions.
pub fn questions_from_prefixed_lines(content: &str) -> Vec<Question> {
    content
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .filter_map(|(i, line)| {
            let n = i + 1;
            Question::hierarchical(
                format!("Q{}", n),
                n.to_string(),
                DEFAULT_TOPIC,
                format!("{}.1", n),
                strip_question_prefix(line),
            )
            .ok()
        })
        .collect()
}

/// `Q12: text` -> `text`; other lines unchanged.
fn strip_question_prefix(line: &str) -> &str {
    let Some(rest) = line.strip_prefix('Q') else {
        return line;
    };
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return line;
    }
    match rest[digits..].strip_prefix(':') {
        Some(after) => after.trim_start(),
        None => line,
    }
}
