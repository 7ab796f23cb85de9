//! Weekly report synthesis
//!
//! Up to seven analyzed entries are condensed into a digest, sent as a single
//! completion, and the reply is normalized into a [`WeeklyReport`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate};
use serde_json::Value;
use tracing::info;

use crate::ai::contract::{parse_json_payload, text_field};
use crate::ai::ModelGateway;
use crate::error::{Error, Result};
use crate::models::{EntryRow, WeeklyReport};
use crate::prompts::{PromptId, PromptLibrary};

pub const MAX_REPORT_ENTRIES: usize = 7;
pub const MAX_TOP_THEMES: usize = 5;
pub const DEFAULT_DOMINANT_EMOTION: &str = "reflective";

/// Characters of entry content included per digest line
pub const EXCERPT_CHARS: usize = 300;

/// Monday of the week containing `day`
pub fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}

fn digest_entry(index: usize, entry: &EntryRow) -> String {
    let mood = entry
        .mood_score
        .map(|m| format!("{:.1}", m))
        .unwrap_or_else(|| "?".to_string());
    let themes = if entry.themes.is_empty() {
        "—".to_string()
    } else {
        entry.themes.join(", ")
    };
    let snippet: String = entry.content.chars().take(EXCERPT_CHARS).collect();
    let snippet = snippet.trim().replace('\n', " ");
    let note = entry.observation.as_deref().unwrap_or("");

    format!(
        "Entry {} (mood {}/10 | themes: {})\n  Excerpt: {}\n  AI note: {}",
        index, mood, themes, snippet, note
    )
}

/// Per-entry digest, in the order given, at most `MAX_REPORT_ENTRIES` long
pub fn build_digest(entries: &[EntryRow]) -> String {
    entries
        .iter()
        .take(MAX_REPORT_ENTRIES)
        .enumerate()
        .map(|(i, entry)| digest_entry(i + 1, entry))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn theme_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Fill defaults, coerce `top_themes` into a list and cap it
pub fn normalize_report(value: Value) -> Result<WeeklyReport> {
    let Value::Object(mut obj) = value else {
        return Err(Error::SchemaViolation(
            "expected a JSON object at the top level".into(),
        ));
    };

    let mut top_themes: Vec<String> = match obj.remove("top_themes") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.into_iter().map(theme_text).collect(),
        Some(single) => vec![theme_text(single)],
    };
    top_themes.truncate(MAX_TOP_THEMES);

    Ok(WeeklyReport {
        dominant_emotion: text_field(&obj, "dominant_emotion", DEFAULT_DOMINANT_EMOTION),
        top_themes,
        emotional_arc: text_field(&obj, "emotional_arc", ""),
        ai_observation: text_field(&obj, "ai_observation", ""),
    })
}

#[derive(Clone)]
pub struct ReportSynthesizer {
    gateway: ModelGateway,
    prompts: Arc<PromptLibrary>,
}

impl ReportSynthesizer {
    pub fn new(gateway: ModelGateway, prompts: Arc<PromptLibrary>) -> Self {
        Self { gateway, prompts }
    }

    /// Synthesize one report from `entries` (only the first seven are used)
    pub async fn synthesize(&self, entries: &[EntryRow]) -> Result<WeeklyReport> {
        if entries.is_empty() {
            return Err(Error::EmptyInput(
                "at least one entry is required to synthesize a report".into(),
            ));
        }

        let digest = build_digest(entries);
        let prompt = self.prompts.get(PromptId::WeeklyReport);
        let mut vars = HashMap::new();
        vars.insert("digest", digest.as_str());
        let user_prompt = prompt.render_user(&vars);

        let raw = self
            .gateway
            .complete(
                &prompt.system,
                &user_prompt,
                PromptId::WeeklyReport.temperature(),
            )
            .await?;
        let report = normalize_report(parse_json_payload(&raw)?)?;

        info!(
            entries = entries.len().min(MAX_REPORT_ENTRIES),
            emotion = %report.dominant_emotion,
            themes = ?report.top_themes,
            "Report synthesised"
        );
        Ok(report)
    }
}
