//! Motion Fusion - headless pipeline runner
//!
//! Starts the fusion engine, optionally connects to an iFacialMocap phone and
//! prints every composited movement record as one JSON line on stdout.

use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use motion_fusion::{
    config::{Config, TrackingMode},
    engine::FusionEngine,
    tracking::MocapClient,
    MovementRecord,
};

/// Motion Fusion - avatar motion pipeline
#[derive(Parser, Debug)]
#[command(name = "motion-fusion", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// iFacialMocap device address (enables mocap)
    #[arg(short, long)]
    mocap: Option<IpAddr>,

    /// iFacialMocap port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Tracking mode (overrides config)
    #[arg(long, value_parser = parse_mode)]
    mode: Option<TrackingMode>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_mode(s: &str) -> Result<TrackingMode, String> {
    match s {
        "face" => Ok(TrackingMode::Face),
        "upper_body" | "upper-body" => Ok(TrackingMode::UpperBody),
        "full_body" | "full-body" => Ok(TrackingMode::FullBody),
        other => Err(format!("unknown tracking mode '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries movement records
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", motion_fusion::NAME, motion_fusion::VERSION);

    let config = load_config(&args)?;
    info!("Tracking mode: {:?}", config.tracking.mode);
    info!("iFacialMocap: {}", config.mocap.enabled);

    let (engine, handle) = FusionEngine::new(config.clone());
    let engine_task = tokio::spawn(engine.run());

    let printer = tokio::spawn(print_movements(
        handle.subscribe(),
        handle.subscribe_shutdown(),
    ));

    let mut client = MocapClient::new(&config.mocap, handle.mocap_sender());
    if config.mocap.enabled {
        match client.connect_configured() {
            Some(signal) => {
                tokio::spawn(async move {
                    match signal.wait().await {
                        Ok(()) => info!("iFacialMocap stream is live"),
                        Err(e) => error!("iFacialMocap connection failed: {}", e),
                    }
                });
            }
            None => warn!("iFacialMocap enabled but no address configured"),
        }
    }

    shutdown_signal().await;
    info!("Shutdown signal received");

    client.disconnect();
    handle.shutdown();
    if let Err(e) = engine_task.await? {
        error!("Fusion engine error: {}", e);
    }
    let _ = printer.await;

    info!("Motion Fusion stopped");
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(address) = args.mocap {
        config.mocap.address = Some(address);
        config.mocap.enabled = true;
    }
    if let Some(port) = args.port {
        config.mocap.port = port;
    }
    if let Some(mode) = args.mode {
        config.tracking.mode = mode;
    }

    config.validate()?;
    Ok(config)
}

async fn print_movements(
    mut movement_rx: broadcast::Receiver<MovementRecord>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = movement_rx.recv() => match result {
                Ok(movement) => match serde_json::to_string(&movement) {
                    Ok(line) => println!("{}", line),
                    Err(e) => error!("Failed to encode movement: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Output lagging, skipped {} records", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown_rx.recv() => break,
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
