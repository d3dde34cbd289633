use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Body of a POST to `/serving-endpoints/{model}/invocations`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatCompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            messages,
            max_tokens,
            temperature,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.messages.is_empty() {
            return Err("Request must contain at least one message".to_string());
        }
        if self.max_tokens == 0 {
            return Err("max_tokens must be positive".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "temperature must be between 0 and 2, got {}",
                self.temperature
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    text: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

impl Choice {
    /// `message.content`, else `text`, else the JSON rendering of the choice.
    pub fn text_content(&self) -> String {
        if let Some(content) = self.message.as_ref().and_then(|m| m.content.as_ref()) {
            if let Some(text) = content_to_text(content) {
                return text;
            }
        }
        if let Some(text) = &self.text {
            return text.clone();
        }

        let mut raw = self.rest.clone();
        if let Some(message) = &self.message {
            raw.insert(
                "message".to_string(),
                serde_json::json!({ "content": message.content }),
            );
        }
        Value::Object(raw).to_string()
    }
}

/// Content is usually a string; some endpoints return a list of typed parts.
fn content_to_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let joined = parts
                .iter()
                .filter_map(|part| {
                    part.get("text")
                        .and_then(Value::as_str)
                        .or_else(|| part.as_str())
                })
                .collect::<Vec<_>>()
                .join("");
            if joined.is_empty() {
                None
            } else {
                Some(joined)
            }
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    pub fn first_text(&self) -> Option<String> {
        self.choices.first().map(Choice::text_content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_message_content_from_first_choice() {
        let raw = r#"{
            "id": "chatcmpl_1",
            "model": "databricks-claude-3-7-sonnet",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "first"}},
                {"index": 1, "message": {"role": "assistant", "content": "second"}}
            ],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
        }"#;

        let response: ChatCompletionResponse = serde_json::from_str(raw).expect("valid response");
        assert_eq!(response.first_text().as_deref(), Some("first"));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(16));
    }

    #[test]
    fn falls_back_to_completion_text() {
        let raw = r#"{"choices": [{"index": 0, "text": "legacy completion"}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).expect("valid response");
        assert_eq!(response.first_text().as_deref(), Some("legacy completion"));
    }

    #[test]
    fn joins_structured_content_parts() {
        let raw = r#"{"choices": [{"message": {"content": [
            {"type": "text", "text": "Hello, "},
            {"type": "text", "text": "world"}
        ]}}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).expect("valid response");
        assert_eq!(response.first_text().as_deref(), Some("Hello, world"));
    }

    #[test]
    fn renders_unknown_choice_shape_as_json() {
        let raw = r#"{"choices": [{"index": 0, "finish_reason": "stop"}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(raw).expect("valid response");
        let text = response.first_text().expect("one choice");
        assert!(text.contains("\"finish_reason\":\"stop\""));
    }

    #[test]
    fn empty_choices_yield_no_text() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": []}"#).expect("valid response");
        assert!(response.first_text().is_none());
    }

    #[test]
    fn request_validation_rejects_out_of_range_parameters() {
        let messages = vec![ChatMessage::user("hi")];
        assert!(ChatCompletionRequest::new(messages.clone(), 1000, 0.1)
            .validate()
            .is_ok());
        assert!(ChatCompletionRequest::new(messages.clone(), 0, 0.1)
            .validate()
            .is_err());
        assert!(ChatCompletionRequest::new(messages, 1000, 2.5)
            .validate()
            .is_err());
        assert!(ChatCompletionRequest::new(vec![], 1000, 0.1)
            .validate()
            .is_err());
    }

    #[test]
    fn request_serializes_lowercase_roles() {
        let request = ChatCompletionRequest::new(
            vec![ChatMessage::system("sys"), ChatMessage::user("ask")],
            15000,
            0.1,
        );
        let value = serde_json::to_value(&request).expect("serializable");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "ask");
        assert_eq!(value["max_tokens"], 15000);
    }
}
