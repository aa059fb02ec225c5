use anyhow::Result;
use clap::Parser;
use tracing::info;

use pie754::simulator::{Simulator, SimulatorConfig};

/// Simulated single-axis PI E-754 speaking GCS over TCP.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:50000")]
    listen: String,

    /// GCS axis identifier
    #[arg(long, default_value = "1")]
    axis: String,

    /// Start position, in dial units
    #[arg(long, default_value_t = 50.0)]
    position: f64,

    /// Lower travel limit
    #[arg(long, default_value_t = 0.0)]
    min: f64,

    /// Upper travel limit
    #[arg(long, default_value_t = 100.0)]
    max: f64,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    let config = SimulatorConfig {
        axis: cli.axis,
        initial_position: cli.position,
        travel: (cli.min, cli.max),
        ..SimulatorConfig::default()
    };

    let simulator = Simulator::bind(&cli.listen, config).await?;
    info!("Point the device server at {}", simulator.local_addr()?);

    tokio::select! {
        result = simulator.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Simulator stopped");
            Ok(())
        }
    }
}
