//! Turnstile gateway binary.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use turnstile_gateway::{config::LoggingConfig, load_config, Server};

#[cfg(feature = "tracing")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "turnstile-gateway", version, about = "Authenticated-routing gateway")]
struct Args {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, env = "TURNSTILE_CONFIG")]
    config: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = load_config(args.config)?;
    init_tracing(&config.logging);

    let server = Server::new(config)?;
    if args.check {
        info!("Configuration is valid");
        return Ok(());
    }

    info!("Starting Turnstile gateway v{}", env!("CARGO_PKG_VERSION"));
    server.run().await?;

    info!("Gateway shutdown complete");
    Ok(())
}

#[cfg(feature = "tracing")]
fn init_tracing(logging: &LoggingConfig) {
    use turnstile_gateway::config::LogFormat;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[cfg(not(feature = "tracing"))]
fn init_tracing(_logging: &LoggingConfig) {}
