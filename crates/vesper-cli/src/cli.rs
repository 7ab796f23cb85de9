//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vesper_core::StoreKind;

/// Vesper - AI journaling assistant
#[derive(Parser)]
#[command(name = "vesper")]
#[command(about = "Mood, theme and distortion insights for journal entries", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Row store: postgrest or memory (overrides VESPER_STORE)
        #[arg(long)]
        store: Option<StoreKind>,
    },

    /// Analyze one entry and print the result as JSON
    Analyze {
        /// Read the entry from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Entry text
        text: Option<String>,
    },

    /// Synthesize a weekly report from a JSON array of entries
    Report {
        /// JSON file with analyzed entries, newest first
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show provider, store and prompt configuration
    Status,

    /// Inspect the prompt library
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (analyze_entry or weekly_report)
        prompt_id: String,
    },
}
