use anyhow::{Context, Result};
use clap::Parser;
use mapbridge_core::config::{AppConfig, LogFormat};
use mapbridge_core::types::Route;
use mapbridge_view::{MapEvent, MapView, SharedRoute};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

mod headless;

use headless::HeadlessEngine;

/// mapbridge - keeps a browser map in sync with a route model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "MAPBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Route to load, YAML or JSON
    #[arg(short, long)]
    route: Option<PathBuf>,

    /// Override the callback listener port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the log level
    #[arg(long)]
    log_level: Option<String>,

    /// Log as JSON
    #[arg(long)]
    json: bool,

    /// Echo generated map scripts to stdout
    #[arg(long)]
    print_scripts: bool,
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    let level = config.logging.parse_level()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
    Ok(())
}

fn load_route(path: &PathBuf) -> Result<Route> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read route file: {:?}", path))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse route file: {:?}", path))
}

/// Applies browser edits to the model the way a UI thread would, then tells
/// the view what changed.
async fn run_ui(view: Arc<MapView>, route: Arc<SharedRoute>, events: flume::Receiver<MapEvent>) {
    let mut selection: BTreeSet<usize> = BTreeSet::new();

    while let Ok(event) = events.recv_async().await {
        match &event {
            MapEvent::SelectPositions { indices, replace } => {
                if *replace {
                    selection.clear();
                }
                selection.extend(indices.iter().copied());
                view.selection_changed(selection.iter().copied().collect(), false);
            }
            MapEvent::DirectionsLoaded { meters, seconds } => {
                info!(meters, seconds, "Directions loaded");
            }
            MapEvent::ViewportChanged { zoom, bounds } => {
                debug!(zoom, bounds = ?bounds, "Viewport changed");
            }
            _ => {
                if let Some(change) = route.apply(&event) {
                    info!(change = ?change, "Route edited from the map");
                    // indices shifted, the old selection no longer points anywhere useful
                    if !matches!(event, MapEvent::MovePosition { .. }) {
                        selection.clear();
                    }
                    view.model_changed(change);
                }
            }
        }
    }
    debug!("UI event loop stopped");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::from_config_builder(args.config.as_ref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.callback.port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json {
        config.logging.format = LogFormat::Json;
    }

    init_tracing(&config)?;
    match &args.config {
        Some(path) => info!("Configuration loaded from {:?}", path),
        None => info!("Using default configuration"),
    }

    let route = match &args.route {
        Some(path) => {
            let route = load_route(path)?;
            info!(
                characteristics = %route.characteristics,
                positions = route.len(),
                "Route loaded"
            );
            Some(route)
        }
        None => None,
    };
    let route = Arc::new(SharedRoute::new(route));

    let engine = Arc::new(HeadlessEngine::new(args.print_scripts));
    let (events_tx, events_rx) = flume::unbounded();
    let view = Arc::new(
        MapView::new(config, engine.clone(), route.clone(), events_tx)
            .context("Failed to create map view")?,
    );

    let port = view.start().await.context("Failed to start map view")?;
    info!(port, "Callback listener ready");
    view.initialize().await.context("Failed to initialize map view")?;

    let ui = tokio::spawn(run_ui(Arc::clone(&view), route, events_rx));

    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");

    view.shutdown().await;
    ui.abort();
    info!(scripts = engine.executed(), "Stopped");
    Ok(())
}
