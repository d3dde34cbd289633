//! Infrastructure layer - configuration, credentials, model invocation,
//! storage and progress events

pub mod ai;
pub mod auth;
pub mod config;
pub mod events;
pub mod storage;

pub use ai::{CompletionParams, ModelInvoker};
pub use auth::{CredentialProvider, DatabricksCredentials, StaticCredentials};
pub use config::{AppConfig, AuthMode, ConfigValidation};
pub use events::{ProgressEvent, ProgressHub};
pub use storage::{SessionStorage, TrackingRecord, VolumeStore};
