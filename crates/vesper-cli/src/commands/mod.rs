//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `analyze` - One-shot entry analysis
//! - `prompts` - Prompt library inspection
//! - `report` - Weekly report synthesis from an entries file
//! - `serve` - Web server command
//! - `status` - Provider, store and prompt configuration

pub mod analyze;
pub mod prompts;
pub mod report;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use analyze::*;
pub use prompts::*;
pub use report::*;
pub use serve::*;
pub use status::*;

use std::path::Path;

use anyhow::{Context, Result};

/// Read a UTF-8 input file with a readable error
pub fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
