//! memliftd — the memlift daemon.
//!
//! Receives task state-change events and remediates out-of-memory worker
//! stops: bumps the service one memory tier, or halts it at the ceiling.
//!
//! # Usage
//!
//! ```text
//! memliftd serve --port 8080 --cluster evalai-workers
//! memliftd handle --event event.json
//! ```

use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use memlift_core::ClusterEvent;
use memliftd::{LogFormat, Settings, build_handler, build_router};

const DEFAULT_LOG_FILTER: &str = "info,memliftd=debug,memlift=debug";

#[derive(Parser)]
#[command(name = "memliftd", about = "OOM remediation daemon", version)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the event ingestion API.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        #[command(flatten)]
        settings: Settings,
    },
    /// Handle one event and print the result.
    Handle {
        /// Event JSON file; reads stdin when omitted.
        #[arg(long)]
        event: Option<PathBuf>,

        #[command(flatten)]
        settings: Settings,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve { port, settings } => run_serve(port, &settings).await,
        Command::Handle { event, settings } => run_handle(event, &settings).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_serve(port: u16, settings: &Settings) -> anyhow::Result<()> {
    let config = settings.load()?;
    let handler = Arc::new(build_handler(config)?);

    let router = build_router(handler);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "event API starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("memliftd stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

async fn run_handle(path: Option<PathBuf>, settings: &Settings) -> anyhow::Result<()> {
    let raw = match &path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading event from stdin")?;
            buf
        }
    };
    let event: ClusterEvent = serde_json::from_str(&raw).context("parsing event")?;

    let handler = build_handler(settings.load()?)?;
    let result = handler.handle(&event).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
