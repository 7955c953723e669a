//! Daytrader strategy runner - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Daytrader strategy runner
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via DAYTRADER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", daytrader_bot::AppConfig::default().to_toml()?);
        return Ok(());
    }

    // Determine config path: CLI arg > DAYTRADER_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("DAYTRADER_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = daytrader_bot::AppConfig::load(&config_path)?;

    daytrader_telemetry::init_logging(&config.telemetry.log_level)?;

    info!("Starting daytrader v{}", env!("CARGO_PKG_VERSION"));
    info!(
        config_path = %config_path,
        account = %config.account,
        target = %config.target.code,
        heartbeat_ms = config.executor.heartbeat_ms,
        "Configuration loaded"
    );

    let app = daytrader_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
