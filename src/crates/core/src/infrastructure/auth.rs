//! Databricks credentials: personal access tokens and service principal
//! OAuth (machine-to-machine) tokens.

use crate::infrastructure::config::{normalize_host, AuthMode, DatabricksSettings};
use crate::util::errors::{QuillError, QuillResult};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Source of the `Authorization` header for serving endpoint calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn mode(&self) -> Option<AuthMode>;

    /// Current header value (`Bearer ...`), or `None` when no credentials
    /// are configured.
    async fn auth_header(&self) -> QuillResult<Option<String>>;

    /// Discard cached tokens and return a freshly obtained header.
    async fn refresh(&self) -> QuillResult<Option<String>>;
}

/// Fixed header. Used for explicit tokens and tests.
pub struct StaticCredentials {
    header: Option<String>,
}

impl StaticCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            header: Some(format!("Bearer {}", token.into())),
        }
    }

    pub fn none() -> Self {
        Self { header: None }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    fn mode(&self) -> Option<AuthMode> {
        self.header.as_ref().map(|_| AuthMode::Token)
    }

    async fn auth_header(&self) -> QuillResult<Option<String>> {
        Ok(self.header.clone())
    }

    async fn refresh(&self) -> QuillResult<Option<String>> {
        Ok(self.header.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Credentials resolved from [`DatabricksSettings`].
pub struct DatabricksCredentials {
    host: String,
    mode: Option<AuthMode>,
    token: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl DatabricksCredentials {
    pub fn from_settings(settings: &DatabricksSettings) -> QuillResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| QuillError::Authentication(format!("Failed to build HTTP client: {}", e)))?;
        let mode = settings.auth_mode();
        match mode {
            Some(m) => info!("Databricks authentication mode: {}", m.label()),
            None => warn!("No Databricks authentication configured"),
        }
        Ok(Self {
            host: normalize_host(&settings.host),
            mode,
            token: settings.token.clone(),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            http,
            cached: Mutex::new(None),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/oidc/v1/token", self.host)
    }

    async fn fetch_oauth_token(&self) -> QuillResult<CachedToken> {
        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => {
                return Err(QuillError::Authentication(
                    "Service principal credentials are incomplete".to_string(),
                ))
            }
        };

        debug!("Requesting OAuth token: url={}", self.token_url());
        let response = self
            .http
            .post(self.token_url())
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "all-apis")])
            .send()
            .await
            .map_err(|e| QuillError::Authentication(format!("OAuth token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview: String = body.chars().take(200).collect();
            return Err(QuillError::Authentication(format!(
                "OAuth token request failed with status {}: {}",
                status.as_u16(),
                preview
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| QuillError::Authentication(format!("Invalid OAuth token response: {}", e)))?;
        let lifetime = parsed
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
            .saturating_sub(TOKEN_REFRESH_MARGIN_SECS);

        Ok(CachedToken {
            access_token: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }
}

#[async_trait]
impl CredentialProvider for DatabricksCredentials {
    fn mode(&self) -> Option<AuthMode> {
        self.mode
    }

    async fn auth_header(&self) -> QuillResult<Option<String>> {
        match self.mode {
            None => Ok(None),
            Some(AuthMode::Token) => Ok(self.token.as_ref().map(|t| format!("Bearer {}", t))),
            Some(AuthMode::ServicePrincipal) => {
                let mut cached = self.cached.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.expires_at {
                        return Ok(Some(format!("Bearer {}", token.access_token)));
                    }
                }
                let fresh = self.fetch_oauth_token().await?;
                let header = format!("Bearer {}", fresh.access_token);
                *cached = Some(fresh);
                Ok(Some(header))
            }
        }
    }

    async fn refresh(&self) -> QuillResult<Option<String>> {
        match self.mode {
            Some(AuthMode::ServicePrincipal) => {
                info!("Refreshing service principal OAuth token");
                let mut cached = self.cached.lock().await;
                *cached = None;
                let fresh = self.fetch_oauth_token().await?;
                let header = format!("Bearer {}", fresh.access_token);
                *cached = Some(fresh);
                Ok(Some(header))
            }
            // Personal access tokens cannot be refreshed.
            _ => self.auth_header().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    async fn token_handler(
        State(calls): State<Arc<AtomicUsize>>,
        headers: HeaderMap,
        body: String,
    ) -> Json<serde_json::Value> {
        assert!(headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("Basic "))
            .unwrap_or(false));
        assert!(body.contains("grant_type=client_credentials"));
        assert!(body.contains("scope=all-apis"));
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        Json(json!({
            "access_token": format!("oauth-{}", n),
            "token_type": "Bearer",
            "expires_in": 3600
        }))
    }

    async fn spawn_token_server() -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/oidc/v1/token", post(token_handler))
            .with_state(calls.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), calls)
    }

    #[tokio::test]
    async fn pat_header_is_static() {
        let settings = DatabricksSettings {
            token: Some("dapi123".to_string()),
            ..Default::default()
        };
        let creds = DatabricksCredentials::from_settings(&settings).unwrap();
        assert_eq!(creds.mode(), Some(AuthMode::Token));
        assert_eq!(
            creds.auth_header().await.unwrap().as_deref(),
            Some("Bearer dapi123")
        );
        assert_eq!(
            creds.refresh().await.unwrap().as_deref(),
            Some("Bearer dapi123")
        );
    }

    #[tokio::test]
    async fn missing_credentials_yield_no_header() {
        let creds = DatabricksCredentials::from_settings(&DatabricksSettings::default()).unwrap();
        assert!(creds.mode().is_none());
        assert!(creds.auth_header().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn service_principal_token_is_cached_until_refresh() {
        let (host, calls) = spawn_token_server().await;
        let settings = DatabricksSettings {
            host,
            client_id: Some("sp-id".to_string()),
            client_secret: Some("sp-secret".to_string()),
            ..Default::default()
        };
        let creds = DatabricksCredentials::from_settings(&settings).unwrap();

        let first = creds.auth_header().await.unwrap();
        let second = creds.auth_header().await.unwrap();
        assert_eq!(first.as_deref(), Some("Bearer oauth-1"));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let refreshed = creds.refresh().await.unwrap();
        assert_eq!(refreshed.as_deref(), Some("Bearer oauth-2"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
