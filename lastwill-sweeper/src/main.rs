//! lastwill sweeper
//!
//! The external scheduler for the handover state machine. On every tick it
//! starts handovers for users past their inactivity threshold and moves
//! expired grace periods on to successor confirmation.
//!
//! # Outputs
//!
//! The sweeper never contacts successors. It persists handover records to the
//! state file and serves them read-only over HTTP for the notification and
//! access layers:
//!
//! - `GET /health`
//! - `GET /handovers/{user_id}`: the user's most recent handover

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use chrono::Utc;
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

use lastwill_core::{
    load_settings, FileStore, HandoverProcess, HandoverService, InactivitySweeper, Settings,
};

const STATE_FILE_NAME: &str = "handovers.json";

/// lastwill inactivity sweeper
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Settings file (JSON). Defaults apply if it does not exist.
    #[arg(short, long, default_value = "lastwill.json")]
    config: PathBuf,

    /// Handover state file. Defaults to handovers.json in the configured data dir.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Seconds between sweeps (overrides the settings file)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Port for the HTTP status endpoint
    #[arg(long, default_value = "8080")]
    http_port: u16,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn resolve_settings(&self) -> Result<Settings> {
        let mut settings = load_settings(&self.config)
            .with_context(|| format!("Failed to load settings from {:?}", self.config))?;
        if let Some(secs) = self.interval_secs {
            settings.sweep_interval_secs = secs;
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    fn resolve_state_file(&self, settings: &Settings) -> PathBuf {
        match (&self.state_file, &settings.data_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join(STATE_FILE_NAME),
            (None, None) => PathBuf::from(STATE_FILE_NAME),
        }
    }
}

type SharedService = Arc<HandoverService<FileStore>>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lastwill_sweeper=info".parse()?)
                .add_directive("lastwill_core=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let settings = args.resolve_settings()?;
    let state_file = args.resolve_state_file(&settings);

    info!("Starting lastwill sweeper");
    info!("State file: {:?}", state_file);
    info!("Grace period: {} days", settings.grace_period_days);

    let store = FileStore::open(&state_file)
        .await
        .with_context(|| format!("Failed to open handover state {:?}", state_file))?;
    let service: SharedService =
        Arc::new(HandoverService::from_settings(Arc::new(store), &settings));

    if args.once {
        let report = service.sweep(Utc::now()).await;
        info!("Single sweep finished: {}", serde_json::to_string(&report)?);
        return Ok(());
    }

    let http_addr: SocketAddr = format!("0.0.0.0:{}", args.http_port).parse()?;
    let http_service = service.clone();
    tokio::spawn(async move {
        if let Err(e) = run_http_server(http_addr, http_service).await {
            warn!("HTTP server error: {:#}", e);
        }
    });

    let sweeper = InactivitySweeper::new(
        service.clone(),
        Duration::from_secs(settings.sweep_interval_secs),
    );
    if !sweeper.start().await {
        anyhow::bail!("Sweeper was already running");
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested, finishing current user before exit");

    sweeper.stop().await;

    info!("Sweeper stopped");
    Ok(())
}

async fn run_http_server(addr: SocketAddr, service: SharedService) -> Result<()> {
    let app = Router::new()
        .route(
            "/health",
            get(|| async {
                Json(json!({
                    "status": "healthy",
                    "version": env!("CARGO_PKG_VERSION"),
                }))
            }),
        )
        .route("/handovers/{user_id}", get(current_handover))
        .with_state(service);

    info!("HTTP status server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn current_handover(
    State(service): State<SharedService>,
    Path(user_id): Path<String>,
) -> Result<Json<HandoverProcess>, StatusCode> {
    match service.current_process(&user_id).await {
        Ok(Some(process)) => Ok(Json(process)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!("Failed to load handover for {}: {}", user_id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_resolution() {
        let args = Args::parse_from(["lastwill-sweeper"]);
        let mut settings = Settings::default();
        assert_eq!(args.resolve_state_file(&settings), PathBuf::from(STATE_FILE_NAME));

        settings.data_dir = Some(PathBuf::from("/var/lib/lastwill"));
        assert_eq!(
            args.resolve_state_file(&settings),
            PathBuf::from("/var/lib/lastwill/handovers.json")
        );

        let args = Args::parse_from(["lastwill-sweeper", "--state-file", "/tmp/h.json"]);
        assert_eq!(args.resolve_state_file(&settings), PathBuf::from("/tmp/h.json"));
    }

    #[test]
    fn test_interval_flag_overrides_settings() {
        let config = std::env::temp_dir().join("lastwill-sweeper-missing-config.json");
        let args = Args::parse_from([
            "lastwill-sweeper",
            "--config",
            config.to_str().unwrap(),
            "--interval-secs",
            "60",
        ]);
        let settings = args.resolve_settings().unwrap();
        assert_eq!(settings.sweep_interval_secs, 60);

        let args = Args::parse_from([
            "lastwill-sweeper",
            "--config",
            config.to_str().unwrap(),
            "--interval-secs",
            "0",
        ]);
        assert!(args.resolve_settings().is_err());
    }
}
