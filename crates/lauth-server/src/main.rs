//! # lauth
//!
//! Main entry point for the lauth OpenID Connect provider.

#![forbid(unsafe_code)]

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lauth_server::cli::{Cli, Command, LogFormat};
use lauth_server::Server;

fn setup_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::GenClient(args)) = &cli.command {
        print!("{}", args.render()?);
        return Ok(());
    }

    setup_tracing(&cli.log_level, cli.log_format);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lauth starting");

    let config = cli.load_config()?;
    let server = Server::new(config).await?;
    server.run().await
}
