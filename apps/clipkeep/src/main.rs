use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,clipkeep=debug")),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config, cli.database)?;

    match cli.command {
        Commands::Run => commands::run(settings).await,
        Commands::List { json, search } => commands::list(settings, json, search.as_deref()).await,
        Commands::Add { text } => commands::add(settings, &text).await,
        Commands::Capture => commands::capture(settings).await,
        Commands::Copy { text } => commands::copy(settings, &text).await,
        Commands::Remove { text } => commands::remove(settings, &text).await,
        Commands::Clear => commands::clear(settings).await,
        Commands::Count => commands::count(settings).await,
    }
}

fn load_settings(
    config: Option<PathBuf>,
    database: Option<PathBuf>,
) -> Result<clipkeep_application::Settings> {
    let mut settings = clipkeep_application::Settings::load(config.as_deref())?;
    if database.is_some() {
        settings.database_path = database;
    }
    Ok(settings)
}
