//! Data models for Vesper
//!
//! Insight and report value types produced by the AI layer, plus the row
//! shapes exchanged with the row store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Dimensionality of every stored embedding
pub const EMBEDDING_DIMS: usize = 384;

/// Cognitive distortion categories recognized in entry analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Distortion {
    Catastrophizing,
    AllOrNothingThinking,
    MindReading,
    Overgeneralization,
    EmotionalReasoning,
    Personalization,
    Filtering,
    ShouldStatements,
}

impl Distortion {
    /// The full controlled vocabulary, in canonical order
    pub const ALL: [Distortion; 8] = [
        Distortion::Catastrophizing,
        Distortion::AllOrNothingThinking,
        Distortion::MindReading,
        Distortion::Overgeneralization,
        Distortion::EmotionalReasoning,
        Distortion::Personalization,
        Distortion::Filtering,
        Distortion::ShouldStatements,
    ];

    /// Canonical label as stored and shown to users
    pub fn label(&self) -> &'static str {
        match self {
            Self::Catastrophizing => "Catastrophizing",
            Self::AllOrNothingThinking => "All-or-nothing thinking",
            Self::MindReading => "Mind reading",
            Self::Overgeneralization => "Overgeneralization",
            Self::EmotionalReasoning => "Emotional reasoning",
            Self::Personalization => "Personalization",
            Self::Filtering => "Filtering",
            Self::ShouldStatements => "Should statements",
        }
    }

    /// Case-insensitive lookup against the controlled vocabulary
    pub fn match_label(label: &str) -> Option<Self> {
        let needle = label.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.label().eq_ignore_ascii_case(needle))
    }
}

impl fmt::Display for Distortion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Distortion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::match_label(s).ok_or_else(|| format!("Unknown distortion label: {}", s))
    }
}

impl TryFrom<String> for Distortion {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Distortion> for String {
    fn from(d: Distortion) -> Self {
        d.label().to_string()
    }
}

/// Validated analysis of a single journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryInsight {
    /// 1.0 = severely distressed, 10.0 = extremely positive
    pub mood_score: f64,
    pub themes: Vec<String>,
    pub distortions: Vec<Distortion>,
    pub observation: String,
}

/// Fixed-length embedding of an entry's content
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Wrap a provider vector, rejecting anything not exactly `EMBEDDING_DIMS` long
    pub fn new(values: Vec<f32>) -> Result<Self> {
        Self::with_dims(values, EMBEDDING_DIMS)
    }

    pub fn with_dims(values: Vec<f32>, dims: usize) -> Result<Self> {
        if values.len() != dims {
            return Err(Error::SchemaViolation(format!(
                "embedding has {} dimensions, expected {}",
                values.len(),
                dims
            )));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// Result of one pipeline invocation, before it becomes a row update
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Success {
        insight: JournalEntryInsight,
        embedding: EmbeddingVector,
    },
    Fallback {
        observation: &'static str,
    },
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success { .. })
    }

    /// Convert into the partial row update persisted for this outcome
    pub fn into_patch(self) -> EntryPatch {
        match self {
            AnalysisOutcome::Success { insight, embedding } => EntryPatch {
                analyzed: Some(true),
                mood_score: Some((insight.mood_score * 10.0).round() / 10.0),
                themes: Some(insight.themes),
                distortions: Some(
                    insight
                        .distortions
                        .into_iter()
                        .map(DistortionRecord::from)
                        .collect(),
                ),
                observation: Some(insight.observation),
                embedding: Some(embedding.into_inner()),
                ..Default::default()
            },
            AnalysisOutcome::Fallback { observation } => EntryPatch {
                analyzed: Some(false),
                observation: Some(observation.to_string()),
                ..Default::default()
            },
        }
    }
}

/// Synthesized summary across recent entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub dominant_emotion: String,
    pub top_themes: Vec<String>,
    pub emotional_arc: String,
    pub ai_observation: String,
}

/// A search hit with its rescaled similarity
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityMatch {
    #[serde(flatten)]
    pub entry: EntryRow,
    /// Rescaled similarity in [0, 1]
    pub similarity: f64,
}

/// Distortion as stored in the entry row (`{"label": ...}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistortionRecord {
    pub label: String,
}

impl From<Distortion> for DistortionRecord {
    fn from(d: Distortion) -> Self {
        Self {
            label: d.label().to_string(),
        }
    }
}

/// Journal entry row as returned by the row store (embedding excluded)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub mood_score: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub themes: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub distortions: Vec<DistortionRecord>,
    pub observation: Option<String>,
    pub analyzed: bool,
}

/// Payload for inserting a new entry
#[derive(Debug, Clone, Serialize)]
pub struct NewEntry {
    pub user_id: Uuid,
    pub content: String,
}

/// Partial entry update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub themes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distortions: Option<Vec<DistortionRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl EntryPatch {
    /// Content edit: new text and analysis reset until the pipeline reruns
    pub fn content_edit(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            analyzed: Some(false),
            ..Default::default()
        }
    }
}

/// Stored weekly report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub week_start: NaiveDate,
    pub dominant_emotion: String,
    #[serde(deserialize_with = "null_as_default")]
    pub top_themes: Vec<String>,
    pub emotional_arc: String,
    pub ai_observation: String,
}

/// Payload for inserting a report
#[derive(Debug, Clone, Serialize)]
pub struct NewReport {
    pub user_id: Uuid,
    pub week_start: NaiveDate,
    #[serde(flatten)]
    pub report: WeeklyReport,
}

/// PostgREST returns `null` for empty array columns
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distortion_match_is_case_insensitive() {
        assert_eq!(
            Distortion::match_label("all-OR-nothing THINKING"),
            Some(Distortion::AllOrNothingThinking)
        );
        assert_eq!(
            Distortion::match_label("  mind reading "),
            Some(Distortion::MindReading)
        );
        assert_eq!(Distortion::match_label("Labeling"), None);
    }

    #[test]
    fn test_distortion_serializes_as_label() {
        let json = serde_json::to_string(&Distortion::ShouldStatements).unwrap();
        assert_eq!(json, r#""Should statements""#);
        let parsed: Distortion = serde_json::from_str(r#""filtering""#).unwrap();
        assert_eq!(parsed, Distortion::Filtering);
    }

    #[test]
    fn test_embedding_dimension_check() {
        assert!(EmbeddingVector::new(vec![0.0; EMBEDDING_DIMS]).is_ok());
        let err = EmbeddingVector::new(vec![0.0; 12]).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }

    #[test]
    fn test_success_patch_rounds_mood_and_wraps_distortions() {
        let outcome = AnalysisOutcome::Success {
            insight: JournalEntryInsight {
                mood_score: 6.27,
                themes: vec!["work pressure".into()],
                distortions: vec![Distortion::Catastrophizing],
                observation: "A demanding week left little room to rest.".into(),
            },
            embedding: EmbeddingVector::new(vec![0.5; EMBEDDING_DIMS]).unwrap(),
        };

        let patch = outcome.into_patch();
        assert_eq!(patch.analyzed, Some(true));
        assert_eq!(patch.mood_score, Some(6.3));
        assert_eq!(
            patch.distortions,
            Some(vec![DistortionRecord {
                label: "Catastrophizing".into()
            }])
        );
        assert_eq!(patch.embedding.map(|e| e.len()), Some(EMBEDDING_DIMS));
    }

    #[test]
    fn test_fallback_patch_only_touches_status_fields() {
        let patch = AnalysisOutcome::Fallback {
            observation: "unavailable",
        }
        .into_patch();

        let json = serde_json::to_value(&patch).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(json["analyzed"], false);
        assert_eq!(json["observation"], "unavailable");
    }

    #[test]
    fn test_entry_row_tolerates_partial_selects() {
        let row: EntryRow = serde_json::from_str(
            r#"{"id": "6f1c0f38-2f6d-4e4a-9a57-0d3b9e1b8a11", "analyzed": true, "mood_score": 7.5, "themes": null}"#,
        )
        .unwrap();
        assert!(row.analyzed);
        assert_eq!(row.mood_score, Some(7.5));
        assert!(row.themes.is_empty());
    }
}
