//! Report command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use vesper_core::{EntryRow, ModelGateway, PromptLibrary, ReportSynthesizer};

use super::read_input;

pub async fn cmd_report(file: &Path) -> Result<()> {
    let entries = load_entries(file)?;
    let prompts = PromptLibrary::from_env().context("Failed to load prompts")?;
    let synthesizer = ReportSynthesizer::new(ModelGateway::from_env(), Arc::new(prompts));

    let report = synthesizer
        .synthesize(&entries)
        .await
        .context("Report synthesis failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Parse a JSON array of entry rows; missing fields take their defaults
pub fn load_entries(path: &Path) -> Result<Vec<EntryRow>> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of entries", path.display()))
}
