//! Configuration: built-in defaults, optional TOML/YAML file, environment.

pub mod domain;
pub mod settings;

pub use domain::{resolve_model_name, AVAILABLE_MODELS, DEFAULT_CUSTOM_PROMPT};
pub use settings::{
    normalize_host, ApiSettings, AppConfig, AppSettings, AuthMode, ConfigValidation,
    DatabricksSettings, ModelSettings, TrackingSettings,
};
