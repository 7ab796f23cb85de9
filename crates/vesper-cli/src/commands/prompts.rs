//! Prompts-related command implementations

use anyhow::{Context, Result};
use vesper_core::{PromptId, PromptLibrary};

/// List all available prompts and their override status
pub fn cmd_prompts_list() -> Result<()> {
    let library = PromptLibrary::from_env().context("Failed to load prompts")?;

    println!("Available Prompts:\n");
    println!("{:<20} {:>11}  {}", "ID", "TEMPERATURE", "SOURCE");
    println!("{}", "-".repeat(60));

    for &id in PromptId::all() {
        let prompt = library.get(id);
        let source = match prompt.override_path {
            Some(ref path) => format!("✓ Custom ({})", path.display()),
            None => "Default".to_string(),
        };
        println!("{:<20} {:>11.1}  {}", id.as_str(), id.temperature(), source);
    }

    println!();
    match std::env::var("VESPER_PROMPTS_DIR") {
        Ok(dir) => println!("Override directory: {}", dir),
        Err(_) => println!("Override directory: (set VESPER_PROMPTS_DIR to enable)"),
    }

    Ok(())
}

/// Parse a prompt id as printed by `vesper prompts list`
pub fn parse_prompt_id(value: &str) -> Option<PromptId> {
    PromptId::all()
        .iter()
        .copied()
        .find(|id| id.as_str() == value.trim())
}

/// Show the content of a specific prompt
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let Some(id) = parse_prompt_id(prompt_id) else {
        eprintln!("Unknown prompt ID: {}", prompt_id);
        eprintln!();
        eprintln!("Available prompts:");
        for id in PromptId::all() {
            eprintln!("  - {}", id.as_str());
        }
        return Ok(());
    };

    let library = PromptLibrary::from_env().context("Failed to load prompts")?;
    let prompt = library.get(id);

    println!("Prompt: {}", id.as_str());
    println!("Temperature: {}", id.temperature());
    println!(
        "Source: {}",
        if prompt.is_override() {
            "Override"
        } else {
            "Default"
        }
    );
    if let Some(ref path) = prompt.override_path {
        println!("Override Path: {}", path.display());
    }

    println!();
    println!("--- System ---");
    println!("{}", prompt.system);
    println!();
    println!("--- User ---");
    println!("{}", prompt.user_template());

    Ok(())
}
