//! Vesper CLI - AI journaling assistant
//!
//! Usage:
//!   vesper serve --port 8000          Start web server
//!   vesper analyze "Today I..."       Analyze one entry
//!   vesper report --file entries.json Synthesize a weekly report
//!   vesper status                     Show configuration and provider health

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Serve { port, host, store } => commands::cmd_serve(&host, port, store).await,
        Commands::Analyze { file, text } => {
            commands::cmd_analyze(file.as_deref(), text.as_deref()).await
        }
        Commands::Report { file } => commands::cmd_report(&file).await,
        Commands::Status => commands::cmd_status().await,
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
        },
    }
}
