//! One-shot entry analysis

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use vesper_core::pipeline::word_count;
use vesper_core::{AnalysisOutcome, InsightPipeline, MemoryStore, ModelGateway, PromptLibrary};

use super::read_input;

pub async fn cmd_analyze(file: Option<&Path>, text: Option<&str>) -> Result<()> {
    let content = match (file, text) {
        (Some(path), _) => read_input(path)?,
        (None, Some(text)) => text.to_string(),
        (None, None) => bail!("Provide entry text or --file"),
    };

    let prompts = PromptLibrary::from_env().context("Failed to load prompts")?;
    // Nothing is persisted; the store only satisfies the pipeline's wiring
    let pipeline = InsightPipeline::new(
        ModelGateway::from_env(),
        Arc::new(MemoryStore::new()),
        Arc::new(prompts),
    );

    let output = analyze_content(&pipeline, &content).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Evaluate `content` and describe the outcome as JSON
pub async fn analyze_content(pipeline: &InsightPipeline, content: &str) -> Result<Value> {
    let outcome = pipeline
        .evaluate(content)
        .await
        .context("Analysis failed")?;

    Ok(match outcome {
        AnalysisOutcome::Success { insight, embedding } => json!({
            "analyzed": true,
            "words": word_count(content),
            "insight": insight,
            "embedding_dims": embedding.len(),
        }),
        AnalysisOutcome::Fallback { observation } => json!({
            "analyzed": false,
            "words": word_count(content),
            "observation": observation,
        }),
    })
}
