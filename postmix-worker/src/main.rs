//! postmix-worker - audio post-processing worker
//!
//! Mixes a vocal stem onto an instrumental, masters the result against a
//! reference track and publishes it, reporting progress to a webhook.
//!
//! Hosts:
//! - `run`: handle one queue envelope read from a file, then exit
//! - `serve`: accept envelopes over HTTP (`POST /jobs`)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postmix_common::config::{ConfigOverrides, TomlConfig, WorkerConfig};
use postmix_worker::{build_orchestrator, build_router, AppState};

/// Command-line arguments for postmix-worker
#[derive(Parser, Debug)]
#[command(name = "postmix-worker")]
#[command(about = "Mixes, masters and publishes songs from queued jobs")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Handle one queue envelope read from a JSON file
    Run {
        /// Envelope file (`{"Records": [{"body": "..."}]}`)
        #[arg(short, long, default_value = "input.json")]
        event: PathBuf,
    },
    /// Accept queue envelopes over HTTP
    Serve,
}

/// Overrides for configuration keys (environment and TOML fill the rest)
#[derive(Args, Debug)]
struct ConfigArgs {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    bucket_name: Option<String>,

    #[arg(long, global = true)]
    region_name: Option<String>,

    #[arg(long, global = true)]
    webhook_url: Option<String>,

    /// S3-compatible endpoint URL
    #[arg(long, global = true)]
    storage_endpoint: Option<String>,

    /// Use a local directory as the object store
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Directory for per-job temporary files
    #[arg(long, global = true)]
    staging_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    poll_timeout_secs: Option<u64>,

    #[arg(long, global = true)]
    poll_interval_secs: Option<u64>,

    /// External mastering program, called with <target> <reference> <output>
    #[arg(long, global = true)]
    mastering_command: Option<String>,

    /// Listen address for `serve`
    #[arg(long, global = true)]
    listen: Option<String>,
}

impl ConfigArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bucket_name: self.bucket_name.clone(),
            region_name: self.region_name.clone(),
            webhook_url: self.webhook_url.clone(),
            storage_endpoint: self.storage_endpoint.clone(),
            storage_dir: self.storage_dir.clone(),
            staging_dir: self.staging_dir.clone(),
            poll_timeout_secs: self.poll_timeout_secs,
            poll_interval_secs: self.poll_interval_secs,
            mastering_command: self.mastering_command.clone(),
            listen: self.listen.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postmix_worker=info,postmix_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let toml = TomlConfig::discover(cli.config.config.as_deref())
        .context("Failed to load config file")?;
    let config = WorkerConfig::resolve(&cli.config.overrides(), toml.as_ref())
        .context("Invalid configuration")?;

    info!("Starting postmix-worker");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        bucket = %config.bucket_name,
        staging = %config.staging_dir.display(),
        poll_timeout_secs = config.poll_timeout.as_secs(),
        poll_interval_secs = config.poll_interval.as_secs(),
        "Configuration resolved"
    );

    tokio::fs::create_dir_all(&config.staging_dir)
        .await
        .with_context(|| format!("Failed to create staging dir {}", config.staging_dir.display()))?;

    let orchestrator = Arc::new(build_orchestrator(&config)?);

    match cli.command {
        Command::Run { event } => {
            info!("Loading {}", event.display());
            let raw = tokio::fs::read_to_string(&event)
                .await
                .with_context(|| format!("Failed to read {}", event.display()))?;

            let outcomes = orchestrator
                .handle_message(&raw)
                .await
                .context("Failed to read queue envelope")?;

            println!("{}", serde_json::to_string_pretty(&outcomes)?);
            info!("Execution completed");
        }
        Command::Serve => {
            let addr: SocketAddr = config
                .listen
                .parse()
                .with_context(|| format!("Invalid listen address: {}", config.listen))?;

            let app = build_router(AppState::new(orchestrator));

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .context("Failed to bind to address")?;
            info!("Listening on http://{}", addr);
            info!("Health check: http://{}/health", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;

            info!("Server shutdown complete");
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
