//! Model invocation on top of the serving endpoint client.
//!
//! Adds what a single POST does not do: credential lookup, one refresh on an
//! expired JWT, and retry according to a [`RetryPolicy`].

use crate::infrastructure::auth::CredentialProvider;
use crate::infrastructure::config::{resolve_model_name, AppConfig};
use crate::util::errors::{QuillError, QuillResult};
use log::{debug, info, warn};
use quill_ai_adapters::{
    ChatCompletionRequest, ChatMessage, InvocationError, RetryPolicy, ServingClient,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

pub struct ModelInvoker {
    client: ServingClient,
    credentials: Arc<dyn CredentialProvider>,
    config: Arc<AppConfig>,
}

impl ModelInvoker {
    pub fn new(config: Arc<AppConfig>, credentials: Arc<dyn CredentialProvider>) -> QuillResult<Self> {
        let client = ServingClient::new(Duration::from_secs(config.api.timeout_secs))?;
        Ok(Self {
            client,
            credentials,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialProvider> {
        &self.credentials
    }

    pub fn timeout(&self) -> Duration {
        self.client.timeout()
    }

    /// Map a display name or endpoint name to an endpoint name.
    pub fn resolve_model(&self, name: &str) -> String {
        resolve_model_name(name)
    }

    pub fn endpoint_url(&self, model: &str) -> String {
        self.config.databricks.endpoint_url(&self.resolve_model(model))
    }

    pub async fn has_credentials(&self) -> bool {
        matches!(self.credentials.auth_header().await, Ok(Some(_)))
    }

    async fn require_header(&self) -> QuillResult<String> {
        self.credentials.auth_header().await?.ok_or_else(|| {
            QuillError::Authentication("No authentication headers available".to_string())
        })
    }

    /// One call, refreshing credentials once if the endpoint reports an
    /// expired token.
    async fn invoke_once(
        &self,
        url: &str,
        request: &ChatCompletionRequest,
    ) -> QuillResult<Result<String, InvocationError>> {
        let header = self.require_header().await?;
        match self.client.invoke(url, &header, request).await {
            Ok(response) => Ok(response
                .first_text()
                .ok_or(InvocationError::EmptyChoices)),
            Err(err) if err.is_token_expired() => {
                warn!("JWT token expired, refreshing authentication");
                let refreshed = self.credentials.refresh().await?;
                match refreshed {
                    Some(new_header) if new_header != header => {
                        info!("Authentication refreshed, retrying request");
                        Ok(self
                            .client
                            .invoke(url, &new_header, request)
                            .await
                            .and_then(|r| r.first_text().ok_or(InvocationError::EmptyChoices)))
                    }
                    _ => Err(QuillError::Authentication(
                        "JWT token expired and refresh did not produce new credentials"
                            .to_string(),
                    )),
                }
            }
            Err(err) => Ok(Err(err)),
        }
    }

    /// Invoke `model` with `messages`, retrying per `policy`. Returns the
    /// last invocation error when attempts run out.
    async fn complete_raw(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: CompletionParams,
        policy: &RetryPolicy,
    ) -> QuillResult<Result<String, InvocationError>> {
        let url = self.endpoint_url(model);
        let request =
            ChatCompletionRequest::new(messages.to_vec(), params.max_tokens, params.temperature);

        let mut attempt = 1;
        loop {
            debug!("Model call: model={}, attempt={}", model, attempt);
            match self.invoke_once(&url, &request).await? {
                Ok(text) => return Ok(Ok(text)),
                Err(err) => {
                    if policy.should_retry(&err, attempt) {
                        let wait = policy.wait_for(attempt);
                        warn!(
                            "Model call failed, retrying: model={}, attempt={}/{}, wait_ms={}, error={}",
                            model,
                            attempt,
                            policy.max_attempts,
                            wait.as_millis(),
                            err
                        );
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(Err(err));
                }
            }
        }
    }

    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: CompletionParams,
        policy: &RetryPolicy,
    ) -> QuillResult<String> {
        self.complete_raw(model, messages, params, policy)
            .await?
            .map_err(QuillError::from)
    }

    /// Standard policy first; if it gives up on a 503, run the extended
    /// policy before failing.
    pub async fn complete_with_extended_retry(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: CompletionParams,
        standard: &RetryPolicy,
        extended: &RetryPolicy,
    ) -> QuillResult<String> {
        match self.complete_raw(model, messages, params, standard).await? {
            Ok(text) => Ok(text),
            Err(err) if err.is_unavailable() => {
                warn!(
                    "Serving endpoint still unavailable after {} attempts, starting extended retry: model={}",
                    standard.max_attempts, model
                );
                self.complete(model, messages, params, extended).await
            }
            Err(err) => Err(err.into()),
        }
    }
}
