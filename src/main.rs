// src/main.rs

mod alert_manager;
mod config;
mod display;
mod error;
mod frame_source;
mod lane_detection;
mod motion_detection;
mod notifier;
mod overlay;
mod pipeline;
mod snapshot;
mod types;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use config::Overrides;
use display::{FrameSink, HeadlessSink, WindowSink};
use frame_source::{CameraSource, SourceDescriptor};
use notifier::AlertNotifier;
use pipeline::{AlertPipeline, RunSummary};
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use types::Config;

/// Lane departure and motion alerts from a live camera. Advisory only.
#[derive(Parser, Debug)]
#[command(name = "road-alert", version, about)]
struct Args {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Camera source: 0 for webcam or http://IP:PORT/video for an IP camera
    #[arg(long)]
    source: Option<String>,

    /// Disable lane overlay drawing
    #[arg(long)]
    no_lanes: bool,

    /// Disable motion alerts
    #[arg(long)]
    no_motion: bool,

    /// Run without a display window
    #[arg(long)]
    headless: bool,

    /// No alert sounds
    #[arg(long)]
    silent: bool,
}

const NOTIFIER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_found = Path::new(&args.config).exists();
    let mut config = if config_found {
        Config::load(&args.config)?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("road_alert={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚗 Road Alert starting (alerts only, no vehicle control)");
    if config_found {
        info!("✓ Configuration loaded from {}", args.config);
    } else {
        warn!("Config {} not found, using defaults", args.config);
    }

    config.apply(&Overrides {
        source: args.source,
        no_lanes: args.no_lanes,
        no_motion: args.no_motion,
        headless: args.headless,
        silent: args.silent,
    });
    config.validate()?;

    let descriptor: SourceDescriptor = config.source.descriptor.parse()?;
    info!(
        "Source: {} | lane overlay: {} | motion alerts: {} | display: {}",
        descriptor,
        config.overlay.draw_lanes,
        config.motion.enabled,
        config.display.enabled
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current frame");
            let _ = shutdown_tx.send(true);
        }
    });

    let backend = notifier::select_backend(config.notifier.backend);
    let (alert_notifier, notifier_task) = AlertNotifier::spawn(backend);

    // HighGUI wants the window and the capture on one thread, off the async workers.
    let outcome = tokio::task::spawn_blocking(move || -> Result<RunSummary> {
        let mut pipeline = AlertPipeline::new(config.clone(), alert_notifier);
        let mut source = CameraSource::new(config.source.clone());
        let mut sink: Box<dyn FrameSink> = if config.display.enabled {
            Box::new(WindowSink::new(&config.display))
        } else {
            Box::new(HeadlessSink::default())
        };
        Ok(pipeline.run(&mut source, sink.as_mut(), &descriptor, &shutdown_rx)?)
    })
    .await
    .context("Frame loop panicked")?;

    if tokio::time::timeout(NOTIFIER_DRAIN_TIMEOUT, notifier_task)
        .await
        .is_err()
    {
        warn!("Pending alert sounds dropped at shutdown");
    }

    let summary = outcome.context("Cannot start monitoring")?;
    info!("📊 Total alerts detected: {}", summary.total_alerts);
    info!("👋 Road Alert stopped");
    Ok(())
}
