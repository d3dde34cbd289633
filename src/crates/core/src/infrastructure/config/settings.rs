use super::domain;
use crate::util::errors::{QuillError, QuillResult};
use log::{debug, info, warn};
use quill_ai_adapters::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEV_MODE_WARNING: &str = "Running in development mode - minimal validation applied";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Token,
    ServicePrincipal,
}

impl AuthMode {
    pub fn label(self) -> &'static str {
        match self {
            AuthMode::Token => "Personal Access Token",
            AuthMode::ServicePrincipal => "Service Principal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabricksSettings {
    pub host: String,
    /// Directory where exports and tracking records are persisted.
    pub volume_path: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    #[serde(skip_serializing)]
    pub client_id: Option<String>,
    #[serde(skip_serializing)]
    pub client_secret: Option<String>,
}

impl Default for DatabricksSettings {
    fn default() -> Self {
        Self {
            host: domain::DEFAULT_HOST.to_string(),
            volume_path: None,
            token: None,
            client_id: None,
            client_secret: None,
        }
    }
}

impl DatabricksSettings {
    /// Host with an `https://` scheme added when none is given and no
    /// trailing slash.
    pub fn normalized_host(&self) -> String {
        normalize_host(&self.host)
    }

    pub fn endpoint_url(&self, model: &str) -> String {
        format!(
            "{}/serving-endpoints/{}/invocations",
            self.normalized_host(),
            model
        )
    }

    /// Service principal wins when both client id and secret are present.
    pub fn auth_mode(&self) -> Option<AuthMode> {
        if non_empty(&self.client_id) && non_empty(&self.client_secret) {
            Some(AuthMode::ServicePrincipal)
        } else if non_empty(&self.token) {
            Some(AuthMode::Token)
        } else {
            None
        }
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

pub fn normalize_host(host: &str) -> String {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub question_extraction_model: String,
    pub answer_generation_model: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            question_extraction_model: domain::DEFAULT_EXTRACTION_MODEL.to_string(),
            answer_generation_model: domain::DEFAULT_GENERATION_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub debug: bool,
    pub development_mode: bool,
    pub max_file_size_mb: u64,
    pub session_timeout_hours: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            debug: false,
            development_mode: false,
            max_file_size_mb: domain::DEFAULT_MAX_FILE_SIZE_MB,
            session_timeout_hours: domain::DEFAULT_SESSION_TIMEOUT_HOURS,
        }
    }
}

impl AppSettings {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    pub enabled: bool,
    /// Sub-directory of the volume that receives tracking records.
    pub directory: String,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "tracking".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub timeout_secs: u64,
    pub temperature: f32,
    pub extraction_max_tokens: u32,
    pub generation_max_tokens: u32,
    /// Send the answer system prompt with generation calls.
    pub generation_system_prompt: bool,
    pub extraction_retry: RetryPolicy,
    pub extraction_extended_retry: RetryPolicy,
    pub generation_retry: RetryPolicy,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            temperature: 0.1,
            extraction_max_tokens: 15000,
            generation_max_tokens: 1000,
            generation_system_prompt: false,
            extraction_retry: RetryPolicy::extraction_standard(),
            extraction_extended_retry: RetryPolicy::extraction_extended(),
            generation_retry: RetryPolicy::generation(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub databricks: DatabricksSettings,
    pub models: ModelSettings,
    pub app: AppSettings,
    pub tracking: TrackingSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl AppConfig {
    /// Default config file location (`~/.config/quill/config.toml`).
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("quill").join("config.toml"))
    }

    /// Defaults, then the config file, then process environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> QuillResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_config_path().filter(|p| p.is_file()) {
                Some(p) => Self::from_file(&p)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> QuillResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            QuillError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("toml")
            .to_ascii_lowercase();
        let config = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| QuillError::Config(format!("Invalid YAML config: {}", e)))?,
            _ => toml::from_str(&content)
                .map_err(|e| QuillError::Config(format!("Invalid TOML config: {}", e)))?,
        };
        debug!("Loaded config file: {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATABRICKS_HOST") {
            self.databricks.host = v;
        }
        if let Some(v) = get("DATABRICKS_TOKEN") {
            self.databricks.token = Some(v);
        }
        if let Some(v) = get("DATABRICKS_CLIENT_ID") {
            self.databricks.client_id = Some(v);
        }
        if let Some(v) = get("DATABRICKS_CLIENT_SECRET") {
            self.databricks.client_secret = Some(v);
        }
        if let Some(v) = get("VOLUME_PATH").or_else(|| get("DATABRICKS_VOLUME_PATH")) {
            self.databricks.volume_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("QUESTION_EXTRACTION_MODEL") {
            self.models.question_extraction_model = v;
        }
        if let Some(v) = get("ANSWER_GENERATION_MODEL") {
            self.models.answer_generation_model = v;
        }
        if let Some(v) = get("APP_DEBUG") {
            apply_bool("APP_DEBUG", &v, &mut self.app.debug);
        }
        if let Some(v) = get("APP_DEVELOPMENT_MODE") {
            apply_bool("APP_DEVELOPMENT_MODE", &v, &mut self.app.development_mode);
        }
        if let Some(v) = get("APP_MAX_FILE_SIZE_MB") {
            match v.trim().parse::<u64>() {
                Ok(mb) if mb > 0 => self.app.max_file_size_mb = mb,
                _ => warn!("Ignoring invalid APP_MAX_FILE_SIZE_MB: {}", v),
            }
        }
        if let Some(v) = get("APP_SESSION_TIMEOUT_HOURS") {
            match v.trim().parse::<u64>() {
                Ok(h) if h > 0 => self.app.session_timeout_hours = h,
                _ => warn!("Ignoring invalid APP_SESSION_TIMEOUT_HOURS: {}", v),
            }
        }
        if let Some(v) = get("TRACKING_ENABLED") {
            apply_bool("TRACKING_ENABLED", &v, &mut self.tracking.enabled);
        }
    }

    pub fn extraction_endpoint(&self) -> String {
        self.databricks
            .endpoint_url(&self.models.question_extraction_model)
    }

    pub fn generation_endpoint(&self) -> String {
        self.databricks.endpoint_url(&self.models.answer_generation_model)
    }

    pub fn validate(&self) -> ConfigValidation {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.databricks.normalized_host().is_empty() {
            errors.push("DATABRICKS_HOST is required".to_string());
        }

        if self.app.development_mode {
            warnings.push(DEV_MODE_WARNING.to_string());
            if self.databricks.auth_mode().is_none() {
                warnings.push("No authentication configured - API calls will fail".to_string());
            }
        } else {
            if self.databricks.auth_mode().is_none() {
                errors.push("No valid Databricks authentication found".to_string());
            }
            if self.models.question_extraction_model.trim().is_empty() {
                errors.push("Question extraction model name is required".to_string());
            }
            if self.models.answer_generation_model.trim().is_empty() {
                errors.push("Answer generation model name is required".to_string());
            }
        }

        if self.databricks.volume_path.is_none() {
            warnings.push("No volume path configured - exports will not be persisted".to_string());
        }

        ConfigValidation {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_summary(&self) {
        info!(
            "Config: domain={} - {}",
            domain::DOMAIN_NAME,
            domain::DOMAIN_DESCRIPTION
        );
        info!("Config: databricks_host={}", self.databricks.normalized_host());
        info!(
            "Config: auth_mode={}",
            self.databricks
                .auth_mode()
                .map(AuthMode::label)
                .unwrap_or("Unknown")
        );
        info!(
            "Config: extraction_model={}, generation_model={}",
            self.models.question_extraction_model, self.models.answer_generation_model
        );
        info!(
            "Config: debug={}, development_mode={}, max_file_size_mb={}",
            self.app.debug, self.app.development_mode, self.app.max_file_size_mb
        );

        if self.app.debug {
            for (name, value) in self.env_presence() {
                debug!("Config env: {}={}", name, value);
            }
        }

        let validation = self.validate();
        for error in &validation.errors {
            warn!("Config error: {}", error);
        }
        for warning in &validation.warnings {
            info!("Config warning: {}", warning);
        }
    }

    /// Presence of the authentication variables, secrets masked as `***`.
    pub fn env_presence(&self) -> Vec<(&'static str, String)> {
        let show = |value: Option<&str>, secret: bool| match value {
            Some(v) if !v.is_empty() => {
                if secret {
                    "***".to_string()
                } else {
                    v.to_string()
                }
            }
            _ => "Not Set".to_string(),
        };
        vec![
            ("DATABRICKS_HOST", show(Some(self.databricks.host.as_str()), false)),
            ("DATABRICKS_TOKEN", show(self.databricks.token.as_deref(), true)),
            (
                "DATABRICKS_CLIENT_ID",
                show(self.databricks.client_id.as_deref(), false),
            ),
            (
                "DATABRICKS_CLIENT_SECRET",
                show(self.databricks.client_secret.as_deref(), true),
            ),
            (
                "APP_DEVELOPMENT_MODE",
                self.app.development_mode.to_string(),
            ),
        ]
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn apply_bool(name: &str, value: &str, target: &mut bool) {
    match parse_bool(value) {
        Some(b) => *target = b,
        None => warn!("Ignoring invalid boolean for {}: {}", name, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_env(pairs: &[(&str, &str)]) -> AppConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).cloned());
        config
    }

    #[test]
    fn host_gets_https_prefix_and_endpoint_url() {
        let config = with_env(&[
            ("DATABRICKS_HOST", "adb-123.azuredatabricks.net/"),
            ("QUESTION_EXTRACTION_MODEL", "extract-ep"),
        ]);
        assert_eq!(
            config.extraction_endpoint(),
            "https://adb-123.azuredatabricks.net/serving-endpoints/extract-ep/invocations"
        );
        assert_eq!(normalize_host("http://localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn volume_path_prefers_short_variable() {
        let config = with_env(&[
            ("DATABRICKS_VOLUME_PATH", "/Volumes/a"),
            ("VOLUME_PATH", "/Volumes/b"),
        ]);
        assert_eq!(config.databricks.volume_path, Some(PathBuf::from("/Volumes/b")));

        let config = with_env(&[("DATABRICKS_VOLUME_PATH", "/Volumes/a")]);
        assert_eq!(config.databricks.volume_path, Some(PathBuf::from("/Volumes/a")));
    }

    #[test]
    fn service_principal_wins_over_token() {
        let config = with_env(&[
            ("DATABRICKS_TOKEN", "dapi"),
            ("DATABRICKS_CLIENT_ID", "id"),
            ("DATABRICKS_CLIENT_SECRET", "secret"),
        ]);
        assert_eq!(config.databricks.auth_mode(), Some(AuthMode::ServicePrincipal));

        let config = with_env(&[("DATABRICKS_TOKEN", "dapi"), ("DATABRICKS_CLIENT_ID", "id")]);
        assert_eq!(config.databricks.auth_mode(), Some(AuthMode::Token));
    }

    #[test]
    fn production_requires_auth() {
        let validation = with_env(&[]).validate();
        assert!(!validation.is_valid);
        assert!(validation
            .errors
            .contains(&"No valid Databricks authentication found".to_string()));
    }

    #[test]
    fn development_mode_downgrades_auth_to_warning() {
        let validation = with_env(&[("APP_DEVELOPMENT_MODE", "true")]).validate();
        assert!(validation.is_valid);
        assert_eq!(validation.warnings[0], DEV_MODE_WARNING);
        assert!(validation
            .warnings
            .iter()
            .any(|w| w.contains("No authentication configured")));
    }

    #[test]
    fn invalid_numbers_and_bools_are_ignored() {
        let config = with_env(&[
            ("APP_MAX_FILE_SIZE_MB", "lots"),
            ("APP_DEBUG", "maybe"),
            ("TRACKING_ENABLED", "0"),
        ]);
        assert_eq!(config.app.max_file_size_mb, 50);
        assert!(!config.app.debug);
        assert!(!config.tracking.enabled);
    }

    #[test]
    fn secrets_are_masked() {
        let config = with_env(&[("DATABRICKS_TOKEN", "dapi-secret")]);
        let presence = config.env_presence();
        let token = presence
            .iter()
            .find(|(k, _)| *k == "DATABRICKS_TOKEN")
            .map(|(_, v)| v.as_str());
        assert_eq!(token, Some("***"));
        let secret = presence
            .iter()
            .find(|(k, _)| *k == "DATABRICKS_CLIENT_SECRET")
            .map(|(_, v)| v.as_str());
        assert_eq!(secret, Some("Not Set"));
    }

    #[test]
    fn loads_partial_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        std::fs::write(
            &path,
            r#"
[models]
answer_generation_model = "rfi-answers"

[api]
generation_system_prompt = true

[api.generation_retry]
max_attempts = 5
"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.models.answer_generation_model, "rfi-answers");
        assert_eq!(
            config.models.question_extraction_model,
            domain::DEFAULT_EXTRACTION_MODEL
        );
        assert!(config.api.generation_system_prompt);
        assert_eq!(config.api.generation_retry.max_attempts, 5);
        assert_eq!(config.api.timeout_secs, 300);
    }
}
