use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use onvif_event_server::{serve, ServerConfig};
use onvif_events::logging::{init_logging_with_level, LoggingMode};
use tracing::{error, info};

/// ONVIF camera emulator event service
///
/// Runs the configured event generators and exposes pull point
/// subscriptions over HTTP.
#[derive(Parser, Debug)]
#[command(name = "onvif-emu-event-server")]
#[command(about = "ONVIF camera emulator event service")]
#[command(version)]
pub struct Args {
    /// JSON configuration file with `devices` and `events` sections
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Logging mode (silent, development, debug, json)
    #[arg(long, default_value = "development")]
    pub log_mode: String,

    /// Default log level when ONVIF_LOG_LEVEL and RUST_LOG are unset
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow::anyhow!("Port must not be 0"));
        }

        self.log_mode
            .parse::<LoggingMode>()
            .with_context(|| "Valid modes: silent, development, debug, json")?;

        if let Some(level) = &self.log_level {
            match level.to_lowercase().as_str() {
                "error" | "warn" | "info" | "debug" | "trace" => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                        level
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    let mode: LoggingMode = args.log_mode.parse()?;
    init_logging_with_level(mode, args.log_level.as_deref())?;

    let config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => {
            info!("No configuration file given, running without generators");
            ServerConfig::default()
        }
    };

    let (inputs, mut manager) = config.build()?;
    info!(
        digital_inputs = inputs.len(),
        generators = manager.generator_count(),
        "Configuration loaded"
    );
    manager.run()?;
    let manager = Arc::new(manager);

    let stopping = Arc::clone(&manager);
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutting down");
        // Answers outstanding long polls so the server can drain
        if let Err(e) = tokio::task::spawn_blocking(move || stopping.shutdown()).await {
            error!("Manager shutdown task failed: {}", e);
        }
    };

    serve(Arc::clone(&manager), args.socket_addr(), shutdown).await?;

    tokio::task::spawn_blocking(move || manager.shutdown())
        .await
        .context("Manager shutdown task failed")?;
    Ok(())
}
