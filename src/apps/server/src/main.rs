use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use quill_core::{AppConfig, QuillWorkflow};
use quill_server::api::SESSION_SWEEP_INTERVAL;
use quill_server::{build_router, logging, spawn_session_sweeper, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "quill-server", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Run(RunArgs),
    /// Print the effective configuration and validate it
    Check(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// TOML or YAML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    #[arg(long, default_value_t = 8000)]
    port: u16,

    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Check(args) => check(args),
    }
}

fn load_config(args: &ConfigArgs) -> Result<AppConfig> {
    AppConfig::load(args.config.as_deref()).context("Failed to load configuration")
}

async fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let level = logging::init_logging(config.app.debug)?;
    tracing::info!(
        version = quill_core::VERSION,
        log_level = logging::level_to_str(level),
        "quill-server starting"
    );

    config.log_summary();
    let validation = config.validate();
    if !validation.is_valid {
        bail!(
            "Configuration validation failed: {}",
            validation.errors.join("; ")
        );
    }

    let workflow = QuillWorkflow::from_config(config)?;
    let state = Arc::new(AppState::new(workflow));
    let sweeper = spawn_session_sweeper(state.clone(), SESSION_SWEEP_INTERVAL);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address: {}:{}", args.host, args.port))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("quill-server stopped");
    Ok(())
}

fn check(args: ConfigArgs) -> Result<()> {
    let config = load_config(&args)?;

    println!("Databricks host: {}", config.databricks.normalized_host());
    println!("Extraction model: {}", config.models.question_extraction_model);
    println!("Generation model: {}", config.models.answer_generation_model);
    for (name, value) in config.env_presence() {
        println!("{}: {}", name, value);
    }

    let validation = config.validate();
    for warning in &validation.warnings {
        println!("Warning: {}", warning);
    }
    for error in &validation.errors {
        println!("Error: {}", error);
    }
    if !validation.is_valid {
        bail!("{} critical configuration error(s)", validation.errors.len());
    }
    println!("Configuration is valid");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => tracing::warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
