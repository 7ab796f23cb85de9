//! Prompt library for the analysis and report requests
//!
//! Prompts are resolved in two layers:
//! 1. An override file `<id>.md` in `VESPER_PROMPTS_DIR`, if set and present
//! 2. The embedded default compiled into the binary
//!
//! Each prompt file has a `# System` section and a `# User` section. The user
//! section is a template with `{{var}}` placeholders.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const ANALYZE_ENTRY: &str = include_str!("../../../prompts/analyze_entry.md");
    pub const WEEKLY_REPORT: &str = include_str!("../../../prompts/weekly_report.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    AnalyzeEntry,
    WeeklyReport,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeEntry => "analyze_entry",
            Self::WeeklyReport => "weekly_report",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::AnalyzeEntry, Self::WeeklyReport]
    }

    /// Sampling temperature used with this prompt
    pub fn temperature(&self) -> f32 {
        match self {
            Self::AnalyzeEntry => 0.4,
            Self::WeeklyReport => 0.5,
        }
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::AnalyzeEntry => defaults::ANALYZE_ENTRY,
            Self::WeeklyReport => defaults::WEEKLY_REPORT,
        }
    }
}

/// A loaded prompt
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    user_template: String,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    fn parse(content: &str, override_path: Option<PathBuf>) -> Result<Self> {
        let system = extract_section(content, "# System").ok_or_else(|| {
            Error::InvalidInput("Prompt is missing a '# System' section".into())
        })?;
        let user = extract_section(content, "# User")
            .ok_or_else(|| Error::InvalidInput("Prompt is missing a '# User' section".into()))?;

        Ok(Self {
            system: system.to_string(),
            user_template: user.to_string(),
            override_path,
        })
    }

    pub fn is_override(&self) -> bool {
        self.override_path.is_some()
    }

    /// Unrendered user section
    pub fn user_template(&self) -> &str {
        &self.user_template
    }

    /// Render the user section, replacing `{{var}}` placeholders
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        let mut result = self.user_template.clone();
        for (key, value) in vars {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, value);
        }
        result
    }
}

/// Immutable set of loaded prompts, shared by the pipeline and synthesizer
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Load prompts, honoring `VESPER_PROMPTS_DIR` overrides
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var("VESPER_PROMPTS_DIR").ok().map(PathBuf::from);
        Self::load(dir.as_deref())
    }

    /// Embedded defaults only
    pub fn embedded() -> Self {
        let prompts = PromptId::all()
            .iter()
            .map(|&id| {
                let prompt = Prompt::parse(id.default_content(), None)
                    .unwrap_or_else(|e| panic!("embedded prompt {} is invalid: {}", id.as_str(), e));
                (id, prompt)
            })
            .collect();
        Self { prompts }
    }

    /// Load prompts, checking `override_dir` before the embedded defaults
    pub fn load(override_dir: Option<&Path>) -> Result<Self> {
        let mut library = Self::embedded();

        let Some(dir) = override_dir else {
            return Ok(library);
        };

        for &id in PromptId::all() {
            let path = dir.join(format!("{}.md", id.as_str()));
            if !path.exists() {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let prompt = Prompt::parse(&content, Some(path.clone()))?;
            info!(prompt = id.as_str(), path = %path.display(), "Using prompt override");
            library.prompts.insert(id, prompt);
        }

        Ok(library)
    }

    pub fn get(&self, id: PromptId) -> &Prompt {
        // Every PromptId is inserted by `embedded()`
        &self.prompts[&id]
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Find the next header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_prompts_parse() {
        let library = PromptLibrary::embedded();
        for &id in PromptId::all() {
            let prompt = library.get(id);
            assert!(!prompt.system.is_empty());
            assert!(!prompt.is_override());
        }
        assert!(library
            .get(PromptId::AnalyzeEntry)
            .system
            .contains("Should statements"));
    }

    #[test]
    fn test_render_user_replaces_placeholders() {
        let library = PromptLibrary::embedded();
        let mut vars = HashMap::new();
        vars.insert("entry", "Today felt long.");
        let rendered = library.get(PromptId::AnalyzeEntry).render_user(&vars);
        assert!(rendered.contains("Today felt long."));
        assert!(!rendered.contains("{{entry}}"));
    }

    #[test]
    fn test_override_dir_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("weekly_report.md"),
            "# System\nBe brief.\n\n# User\nEntries:\n{{digest}}\n",
        )
        .unwrap();

        let library = PromptLibrary::load(Some(dir.path())).unwrap();
        let report = library.get(PromptId::WeeklyReport);
        assert_eq!(report.system, "Be brief.");
        assert!(report.is_override());
        // Missing override falls back to the embedded prompt
        assert!(!library.get(PromptId::AnalyzeEntry).is_override());
    }

    #[test]
    fn test_override_without_sections_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("analyze_entry.md"), "just some text").unwrap();

        let result = PromptLibrary::load(Some(dir.path()));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
