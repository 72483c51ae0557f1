//! relay: LLM provider wire-format translator
//!
//! Builds, sends and decodes requests for many LLM vendors from one
//! canonical request shape.

mod cli;
mod commands;
mod transport;

use clap::Parser;
use cli::{Cli, Commands};
use relay_core::{ConfigStore, Session};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("relay_cli=debug,relay_core=debug,relay_provider=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_store = match &cli.config {
        Some(path) => ConfigStore::with_path(path),
        None => ConfigStore::new(),
    };
    let config = config_store.try_load()?;
    config_store.hydrate_env();
    let session = Session::new(config)?;

    let provider = cli.provider.as_deref();
    let model = cli.model.as_deref();
    match &cli.command {
        Commands::Providers => commands::providers::run(&session),
        Commands::Prepare(args) => commands::prepare::run(&session, provider, model, args)?,
        Commands::Send(args) => commands::send::run(&session, provider, model, args).await?,
        Commands::Decode { stream, file } => {
            commands::decode::run(&session, provider, model, *stream, file.as_deref())?
        }
    }

    Ok(())
}
