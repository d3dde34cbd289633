//! Logging bootstrap.
//!
//! Installs a `tracing-subscriber` formatter. Records emitted by the core
//! crates through `log` are forwarded into it.

use tracing_subscriber::EnvFilter;

pub const LOG_LEVEL_ENV: &str = "QUILL_LOG_LEVEL";

/// Noisy dependencies are capped at `warn` unless the level is stricter.
const QUIET_TARGETS: [&str; 3] = ["hyper", "h2", "reqwest"];

pub fn resolve_default_level(is_debug: bool) -> log::LevelFilter {
    let fallback = if is_debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    match std::env::var(LOG_LEVEL_ENV) {
        Ok(val) => parse_log_level(&val).unwrap_or_else(|| {
            eprintln!(
                "Warning: Invalid {} '{}', falling back to default",
                LOG_LEVEL_ENV, val
            );
            fallback
        }),
        Err(_) => fallback,
    }
}

pub fn parse_log_level(value: &str) -> Option<log::LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(log::LevelFilter::Trace),
        "debug" => Some(log::LevelFilter::Debug),
        "info" => Some(log::LevelFilter::Info),
        "warn" => Some(log::LevelFilter::Warn),
        "error" => Some(log::LevelFilter::Error),
        "off" => Some(log::LevelFilter::Off),
        _ => None,
    }
}

pub fn level_to_str(level: log::LevelFilter) -> &'static str {
    match level {
        log::LevelFilter::Trace => "trace",
        log::LevelFilter::Debug => "debug",
        log::LevelFilter::Info => "info",
        log::LevelFilter::Warn => "warn",
        log::LevelFilter::Error => "error",
        log::LevelFilter::Off => "off",
    }
}

pub fn filter_directives(level: log::LevelFilter) -> String {
    let base = level_to_str(level);
    if level <= log::LevelFilter::Warn {
        return base.to_string();
    }
    let mut directives = vec![base.to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{}=warn", t)));
    directives.join(",")
}

pub fn init_logging(is_debug: bool) -> anyhow::Result<log::LevelFilter> {
    let level = resolve_default_level(is_debug);
    let filter = EnvFilter::try_new(filter_directives(level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(level)
}
