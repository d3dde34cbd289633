//! HTTP API.
//!
//! [`build_router`] assembles every `/api/v1` route together with the CORS,
//! tracing and body-limit layers.

pub mod error;
pub mod response;

mod chat;
mod export;
mod generation;
mod sessions;
mod status;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::Router;
use quill_core::QuillWorkflow;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiResult};
pub use response::{APIResponse, Response};

/// Idle sessions are swept on this interval.
pub const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Multipart framing on top of the configured upload limit.
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

pub struct AppState {
    pub workflow: Arc<QuillWorkflow>,
}

impl AppState {
    pub fn new(workflow: QuillWorkflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
        }
    }
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: SharedState) -> Router {
    let body_limit = usize::try_from(state.workflow.config().app.max_file_size_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_HEADROOM);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    let api = Router::new()
        .merge(status::router())
        .merge(sessions::router())
        .merge(generation::router())
        .merge(export::router())
        .merge(chat::router());

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Periodically drop sessions idle for longer than the configured timeout.
pub fn spawn_session_sweeper(state: SharedState, every: Duration) -> tokio::task::JoinHandle<()> {
    let max_age = Duration::from_secs(state.workflow.config().app.session_timeout_hours * 3600);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let expired = state.workflow.expire_idle_sessions(max_age);
            if !expired.is_empty() {
                tracing::info!(count = expired.len(), "expired idle sessions");
            }
        }
    })
}
