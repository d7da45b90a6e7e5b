use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use geoip_api::{
    config::Config, geoip::GeoIpService, scheduler::RefreshScheduler, web::WebServer,
};

#[derive(Parser)]
#[command(name = "geoip-api")]
#[command(version = "0.1.0")]
#[command(about = "Self-updating GeoIP lookup service")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with specified level
    let log_filter = format!("geoip_api={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting GeoIP API service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from specified file
    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    // Override config with CLI arguments
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let geoip = Arc::new(GeoIpService::new(&config.geoip)?);

    // The service must not start serving without one good database; a failed
    // startup refresh is fatal, unlike scheduled ones.
    geoip
        .refresh()
        .await
        .context("failed to set up geoip database")?;

    let scheduler = RefreshScheduler::spawn(geoip.clone(), config.geoip.refresh_interval());
    info!(
        "Scheduled database refresh every {} hours",
        config.geoip.refresh_interval_hours
    );

    let web_server = WebServer::new(&config, geoip.clone())?;
    info!("Starting web server on {}", web_server.addr());
    web_server.serve().await?;

    // Serve returned after the shutdown signal: stop scheduling refreshes,
    // then tear the service down.
    scheduler.stop().await;
    geoip.close().await;
    info!("Shutdown complete");
    Ok(())
}
