use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::connect_session;
use infrastructure::SessionConfig;
use psu_cli::{Command, Overrides, execute};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory (optional)
    #[arg(long)]
    config_dir: Option<String>,

    /// Talk to the built-in simulated PSU
    #[arg(long)]
    simulate: bool,

    /// Serial port of the instrument (e.g. /dev/ttyACM0, COM3)
    #[arg(long)]
    port: Option<String>,

    /// TCP address of the instrument: host, host:port or [ipv6]:port
    #[arg(long)]
    host: Option<String>,

    /// Reply timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

async fn run() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,psu_cli=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Run from the workspace root during development
    let config_dir = args.config_dir.clone().unwrap_or_else(|| {
        let dev_dir = "crates/psu-cli/config";
        if std::path::Path::new(dev_dir).exists() {
            dev_dir.to_string()
        } else {
            "config".to_string()
        }
    });
    info!(config_dir = %config_dir, "Loading configuration");

    let mut config = SessionConfig::load(&config_dir)?;
    Overrides {
        simulate: args.simulate,
        port: args.port,
        host: args.host,
        timeout_ms: args.timeout_ms,
    }
    .apply(&mut config)?;

    let mut instrument = connect_session(&config).await?;
    let result = execute(&mut instrument, &args.command).await;
    if let Err(e) = instrument.close().await {
        error!(error = %e, "Failed to close instrument session");
    }

    let output = result?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

fn main() {
    let result = tokio::runtime::Runtime::new()
        .map_err(anyhow::Error::from)
        .and_then(|rt| rt.block_on(run()));
    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }
}
