use super::response::{ok, Response};
use super::SharedState;
use axum::extract::State;
use axum::routing::get;
use axum::Router;
use quill_core::infrastructure::config::domain::{APP_DESCRIPTION, APP_TITLE};
use quill_core::infrastructure::config::{AuthMode, AVAILABLE_MODELS};
use serde::Serialize;

pub(super) fn router() -> Router<SharedState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/status", get(status))
}

async fn ping() -> Response<&'static str> {
    ok("pong")
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOption {
    pub name: &'static str,
    pub endpoint: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub title: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub connected: bool,
    pub host: String,
    pub auth_mode: &'static str,
    pub extraction_model: String,
    pub generation_model: String,
    pub available_models: Vec<ModelOption>,
    pub development_mode: bool,
    pub active_sessions: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

async fn status(State(state): State<SharedState>) -> Response<ServiceStatus> {
    let workflow = &state.workflow;
    let config = workflow.config();
    let validation = config.validate();
    let has_credentials = workflow.invoker().has_credentials().await;

    ok(ServiceStatus {
        title: APP_TITLE,
        description: APP_DESCRIPTION,
        version: quill_core::VERSION,
        connected: validation.is_valid && has_credentials,
        host: config.databricks.normalized_host(),
        auth_mode: config
            .databricks
            .auth_mode()
            .map(AuthMode::label)
            .unwrap_or("Unknown"),
        extraction_model: config.models.question_extraction_model.clone(),
        generation_model: config.models.answer_generation_model.clone(),
        available_models: AVAILABLE_MODELS
            .iter()
            .map(|&(name, endpoint)| ModelOption { name, endpoint })
            .collect(),
        development_mode: config.app.development_mode,
        active_sessions: workflow.sessions().len(),
        errors: validation.errors,
        warnings: validation.warnings,
    })
}
