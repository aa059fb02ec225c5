use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use pie754::{
    axis::pi_e754::PiE754Axis, config::AppConfig, device_manager::DeviceManager,
    socket_server::SocketServer,
};

/// PI E-754 device server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Controller host name or IP address
    #[arg(long)]
    ctrl_host: Option<String>,

    /// Controller GCS port
    #[arg(long)]
    ctrl_port: Option<u16>,

    /// GCS axis identifier on the controller
    #[arg(long)]
    axis_name: Option<String>,

    /// Address the device server listens on
    #[arg(long)]
    listen: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

impl Cli {
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => {
                let axis_name = self
                    .axis_name
                    .clone()
                    .context("--axis-name is required when no --config is given")?;
                AppConfig::new(axis_name)
            }
        };

        if let Some(host) = &self.ctrl_host {
            config.device.ctrl_host = host.clone();
        }
        if let Some(port) = self.ctrl_port {
            config.device.ctrl_port = port;
        }
        if let Some(axis_name) = &self.axis_name {
            config.device.axis_name = axis_name.clone();
        }
        if let Some(listen) = &self.listen {
            config.server.listen_addr = listen.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    let config = cli.load_config()?;

    info!(
        "Starting PI E-754 device server for axis {} at {}:{}",
        config.device.axis_name, config.device.ctrl_host, config.device.ctrl_port
    );

    let axis = Arc::new(PiE754Axis::new(config.device.clone()));
    let manager = Arc::new(DeviceManager::new(config.manager.clone(), axis));

    // A failed init leaves the device in FAULT; clients can retry with `init`.
    if let Err(e) = manager.initialize().await {
        error!("Initial connection failed: {:#}", e);
    }

    let mut socket_server = SocketServer::new(config.server.clone(), manager.clone());
    socket_server.start().await?;

    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    socket_server.shutdown().await?;
    manager.shutdown().await?;
    info!("PI E-754 device server stopped");

    Ok(())
}
