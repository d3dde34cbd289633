//! Serving endpoint adapters.
//!
//! Wire types for the chat-completions payloads accepted by model serving
//! endpoints, a thin HTTP client that classifies endpoint failures, and the
//! retry/backoff schedule used by callers.

pub mod client;
pub mod retry;
pub mod types;

pub use client::{InvocationError, ServingClient};
pub use retry::{Backoff, RetryCondition, RetryPolicy};
pub use types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatRole};
