//! Quill Server - HTTP API over the question extraction and answer
//! generation workflow.

pub mod api;
pub mod logging;

pub use api::{build_router, spawn_session_sweeper, AppState, SharedState};
