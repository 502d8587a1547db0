//! sdbrowse - browse DNS-SD services announced on the network.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use eframe::egui;
use sdbrowse_core::config::{BrowserConfig, LogFormat, LoggingConfig};
use sdbrowse_gui::DiscoverApp;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable naming an optional YAML configuration file
const CONFIG_ENV: &str = "SDBROWSE_CONFIG";

/// Browse the services announced on the local network
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Additional domain to browse
    #[arg(short, long)]
    domain: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut config = BrowserConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?;
    if let Some(domain) = args.domain {
        config.browse = config.browse.with_domain(domain);
    }
    config.validate().context("Invalid configuration")?;

    init_logging(&config.logging);

    if let Some(ref path) = config_path {
        info!("Configuration loaded from {:?}", path);
    }
    info!(
        browse_local = config.browse.browse_local,
        browse_all_domains = config.browse.browse_all_domains,
        domains = ?config.browse.normalized_domains(),
        "Starting service browser"
    );

    // A daemon failure ends the process here, before any window opens
    let app = DiscoverApp::start(&config).context("Failed to start service browser")?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 600.0])
            .with_min_inner_size([480.0, 320.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Service Browser",
        options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow!("Window error: {}", e))
}

/// Installs the global subscriber; `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
