//! Splitting a topic-batch response into per-question answers.
//!
//! The model is asked to answer a block of `1.01: ...` questions in one
//! reply. Each answer starts at a dotted number and runs until a blank line
//! followed by the next `<number>:` marker.

use crate::util::types::{Answer, Question};
use indexmap::IndexMap;
use std::collections::HashMap;

pub const COMBINED_ANSWER_ID: &str = "combined";

/// Questions sharing a topic, in document order.
#[derive(Debug, Clone)]
pub struct TopicGroup {
    pub topic: String,
    /// Parent question number of the first member.
    pub question: Option<String>,
    pub sub_questions: Vec<String>,
    /// `"{sub_question}: {text}"` blocks separated by blank lines.
    pub text: String,
    texts: HashMap<String, String>,
}

impl TopicGroup {
    pub fn question_text(&self, sub_question: &str) -> String {
        self.texts
            .get(sub_question)
            .cloned()
            .unwrap_or_else(|| format!("Question {}", sub_question))
    }

    pub fn len(&self) -> usize {
        self.sub_questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_questions.is_empty()
    }
}

/// Group hierarchical questions by topic. Groups appear in the order their
/// topic is first seen.
pub fn group_by_topic(questions: &[Question]) -> Vec<TopicGroup> {
    let mut groups: IndexMap<String, TopicGroup> = IndexMap::new();
    for q in questions {
        let topic = q.topic.clone().unwrap_or_else(|| "General".to_string());
        let sub = q.answer_id();
        let group = groups.entry(topic.clone()).or_insert_with(|| TopicGroup {
            topic,
            question: q.question.clone(),
            sub_questions: Vec::new(),
            text: String::new(),
            texts: HashMap::new(),
        });
        if !group.text.is_empty() {
            group.text.push_str("\n\n");
        }
        group.text.push_str(&format!("{}: {}", sub, q.text));
        group.texts.entry(sub.clone()).or_insert_with(|| q.text.clone());
        group.sub_questions.push(sub);
    }
    groups.into_values().collect()
}

/// Length of a `\d+(\.\d+)*` run at the start of `s`, or 0.
fn number_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == 0 {
        return 0;
    }
    loop {
        if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        } else {
            return i;
        }
    }
}

/// True when `s` starts with a blank line followed by `<number>:`.
fn is_boundary(s: &str) -> bool {
    match s.strip_prefix("\n\n") {
        Some(rest) => {
            let n = number_len(rest);
            n > 0 && rest[n..].starts_with(':')
        }
        None => false,
    }
}

/// Split `response` into `(number, answer)` segments. Later duplicates
/// replace the answer but keep the first position.
pub fn split_numbered_answers(response: &str) -> IndexMap<String, String> {
    let mut answers = IndexMap::new();
    let mut pos = 0;

    while pos < response.len() {
        let start = match response[pos..].find(|c: char| c.is_ascii_digit()) {
            Some(offset) => pos + offset,
            None => break,
        };
        let id_end = start + number_len(&response[start..]);
        let id = &response[start..id_end];

        let mut body_start = id_end;
        if response[body_start..].starts_with(':') {
            body_start += 1;
        }
        body_start += response[body_start..].len() - response[body_start..].trim_start().len();

        let mut end = response.len();
        for (offset, _) in response[body_start..].char_indices() {
            if is_boundary(&response[body_start + offset..]) {
                end = body_start + offset;
                break;
            }
        }

        answers.insert(
            id.trim().to_string(),
            response[body_start..end].trim().to_string(),
        );
        pos = end;
    }
    answers
}

fn loose_match<'a>(answers: &'a IndexMap<String, String>, sub_question: &str) -> Option<&'a str> {
    let undotted = sub_question.replace('.', "");
    answers
        .iter()
        .find(|(id, _)| {
            sub_question.ends_with(id.as_str())
                || sub_question.contains(id.as_str())
                || undotted == id.replace('.', "")
        })
        .map(|(_, answer)| answer.as_str())
}

/// Map a topic response onto the group's sub-questions.
///
/// Each sub-question takes the exactly numbered answer, else the first
/// loosely matching one. An empty or missing match takes the whole response. A response without any
/// numbered segment becomes a single combined answer for the topic.
pub fn parse_topic_response(response: &str, group: &TopicGroup) -> Vec<Answer> {
    let segments = split_numbered_answers(response);
    if segments.is_empty() {
        return vec![Answer::generated(
            COMBINED_ANSWER_ID,
            format!("Combined questions for {}", group.topic),
            response.trim(),
            group.topic.clone(),
        )];
    }

    let full = response.trim();
    group
        .sub_questions
        .iter()
        .map(|sub| {
            let answer = match segments.get(sub.as_str()) {
                Some(exact) => Some(exact.as_str()),
                None => loose_match(&segments, sub),
            }
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(full);
            Answer::generated(
                sub.clone(),
                group.question_text(sub),
                answer.to_string(),
                group.topic.clone(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions() -> Vec<Question> {
        vec![
            Question::hierarchical("Q1", "1", "Security", "1.01", "Do you encrypt data at rest?")
                .unwrap(),
            Question::hierarchical("Q2", "2", "Pricing", "2.01", "How is usage billed?").unwrap(),
            Question::hierarchical("Q3", "1", "Security", "1.02", "Is SSO supported?").unwrap(),
        ]
    }

    #[test]
    fn groups_keep_document_order() {
        let groups = group_by_topic(&questions());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].topic, "Security");
        assert_eq!(groups[0].sub_questions, vec!["1.01", "1.02"]);
        assert_eq!(
            groups[0].text,
            "1.01: Do you encrypt data at rest?\n\n1.02: Is SSO supported?"
        );
        assert_eq!(groups[0].question.as_deref(), Some("1"));
        assert_eq!(groups[1].topic, "Pricing");
    }

    #[test]
    fn splits_on_blank_line_number_markers() {
        let parsed = split_numbered_answers(
            "1.01: Yes, AES-256 is used.\nKeys rotate yearly.\n\n1.02: Yes, via SAML 2.0.",
        );
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["1.01"], "Yes, AES-256 is used.\nKeys rotate yearly.");
        assert_eq!(parsed["1.02"], "Yes, via SAML 2.0.");
    }

    #[test]
    fn duplicate_numbers_keep_last_answer() {
        let parsed = split_numbered_answers("1: first\n\n2: second\n\n1: again");
        let keys: Vec<_> = parsed.keys().cloned().collect();
        assert_eq!(keys, vec!["1", "2"]);
        assert_eq!(parsed["1"], "again");
    }

    #[test]
    fn maps_answers_onto_sub_questions() {
        let group = group_by_topic(&questions()).remove(0);
        let answers =
            parse_topic_response("1.01: Yes, AES-256.\n\n1.02: Yes, SAML and OIDC.", &group);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].question_id, "1.01");
        assert_eq!(answers[0].question_text, "Do you encrypt data at rest?");
        assert_eq!(answers[0].answer, "Yes, AES-256.");
        assert_eq!(answers[1].answer, "Yes, SAML and OIDC.");
        assert_eq!(answers[1].topic, "Security");
    }

    #[test]
    fn missing_answers_fall_back_to_loose_match_or_full_response() {
        let group = group_by_topic(&questions()).remove(0);
        let response = "101: Encrypted with AES-256.";
        let answers = parse_topic_response(response, &group);
        assert_eq!(answers[0].answer, "Encrypted with AES-256.");
        // "1.02" has no exact, suffix, substring or undotted match.
        assert_eq!(answers[1].answer, response);
    }

    #[test]
    fn empty_segment_takes_the_full_response() {
        let group = group_by_topic(&questions()).remove(0);
        let response = "1.01: Yes, AES-256.\n\n1.02:";
        let answers = parse_topic_response(response, &group);
        assert_eq!(answers[0].answer, "Yes, AES-256.");
        assert_eq!(answers[1].question_id, "1.02");
        assert_eq!(answers[1].answer, response);
    }

    #[test]
    fn unnumbered_response_becomes_combined_answer() {
        let group = group_by_topic(&questions()).remove(1);
        let answers = parse_topic_response("  We bill per seat.  ", &group);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question_id, COMBINED_ANSWER_ID);
        assert_eq!(answers[0].question_text, "Combined questions for Pricing");
        assert_eq!(answers[0].answer, "We bill per seat.");
    }
}
