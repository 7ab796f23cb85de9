//! Output contract for entry analysis responses
//!
//! Model output is turned into a [`JournalEntryInsight`] in two phases:
//!
//! 1. **Normalize**: strip a Markdown fence, parse JSON, match distortion
//!    labels against the controlled vocabulary, clamp the mood score and fill
//!    in missing optional fields.
//! 2. **Validate**: deserialize the normalized object into the strict contract
//!    and re-check its bounds.
//!
//! Normalization absorbs the usual model drift (extra casing, unknown labels,
//! out-of-range scores) so that only output that is actually broken fails.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};
use crate::models::{Distortion, JournalEntryInsight};

/// Maximum characters of raw output carried in a `MalformedOutput` error
pub const EXCERPT_LEN: usize = 300;

pub const MOOD_MIN: f64 = 1.0;
pub const MOOD_MAX: f64 = 10.0;
pub const MOOD_DEFAULT: f64 = 5.0;

/// Strip a leading and/or trailing Markdown code fence
pub fn strip_fence(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the opening fence line, including any language tag
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Bounded excerpt of model output for error messages
pub fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_LEN).collect()
}

/// Strip any fence and parse the remaining text as JSON
///
/// Top-level number literals beyond `f64` range (such as `1e400`) saturate to
/// `±f64::MAX` instead of failing the parse, so they clamp like any other
/// out-of-range score.
pub fn parse_json_payload(raw: &str) -> Result<Value> {
    let text = strip_fence(raw);
    serde_json::from_str(text)
        .ok()
        .or_else(|| parse_saturating(text))
        .ok_or_else(|| Error::MalformedOutput {
            excerpt: excerpt(text),
        })
}

/// Re-parse an object field by field, saturating overflowing number literals
fn parse_saturating(text: &str) -> Option<Value> {
    let fields: BTreeMap<String, Box<RawValue>> = serde_json::from_str(text).ok()?;
    fields
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(raw.get())
                .ok()
                .or_else(|| saturated_number(raw.get()))?;
            Some((key, value))
        })
        .collect::<Option<Map<String, Value>>>()
        .map(Value::Object)
}

fn saturated_number(literal: &str) -> Option<Value> {
    let n = literal.parse::<f64>().ok().filter(|n| n.is_infinite())?;
    Number::from_f64(f64::MAX.copysign(n)).map(Value::Number)
}

/// Clamp a mood score into the valid range
pub fn clamp_mood(score: f64) -> f64 {
    score.clamp(MOOD_MIN, MOOD_MAX)
}

/// Match labels case-insensitively against the controlled vocabulary.
///
/// Unknown labels are dropped. Duplicates collapse to their first occurrence.
pub fn normalize_distortions<S: AsRef<str>>(labels: &[S]) -> Vec<Distortion> {
    let mut matched = Vec::new();
    for label in labels {
        if let Some(d) = Distortion::match_label(label.as_ref()) {
            if !matched.contains(&d) {
                matched.push(d);
            }
        }
    }
    matched
}

/// Phase 1: normalize a raw JSON value into the insight shape
pub fn normalize_insight(value: Value) -> Result<Value> {
    let Value::Object(mut obj) = value else {
        return Err(Error::SchemaViolation(
            "expected a JSON object at the top level".into(),
        ));
    };

    let labels: Vec<String> = match obj.remove("distortions") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => vec![s],
        _ => Vec::new(),
    };
    let distortions = normalize_distortions(&labels)
        .into_iter()
        .map(|d| Value::String(d.label().to_string()))
        .collect();
    obj.insert("distortions".into(), Value::Array(distortions));

    let mood = normalize_mood(obj.get("mood_score"))?;
    obj.insert("mood_score".into(), Value::from(mood));

    match obj.get("themes") {
        None | Some(Value::Null) => {
            obj.insert("themes".into(), Value::Array(Vec::new()));
        }
        Some(_) => {}
    }

    // An explicit null observation is left for the validator to reject
    if !obj.contains_key("observation") {
        obj.insert("observation".into(), Value::String(String::new()));
    }

    Ok(Value::Object(obj))
}

fn normalize_mood(value: Option<&Value>) -> Result<f64> {
    let score = match value {
        None | Some(Value::Null) => return Ok(MOOD_DEFAULT),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| Error::SchemaViolation(format!("mood_score {} is not a float", n)))?,
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            Error::SchemaViolation(format!("mood_score {:?} is not numeric", s))
        })?,
        Some(other) => {
            return Err(Error::SchemaViolation(format!(
                "mood_score has unexpected type: {}",
                other
            )))
        }
    };

    if score.is_nan() {
        return Err(Error::SchemaViolation("mood_score is NaN".into()));
    }
    Ok(clamp_mood(score))
}

/// Strict insight contract checked after normalization
#[derive(Debug, Deserialize)]
struct InsightContract {
    mood_score: f64,
    themes: Vec<String>,
    distortions: Vec<Distortion>,
    observation: String,
}

/// Phase 2: validate a normalized value against the strict contract
pub fn validate_insight(normalized: Value) -> Result<JournalEntryInsight> {
    let contract: InsightContract = serde_json::from_value(normalized)
        .map_err(|e| Error::SchemaViolation(format!("insight contract: {}", e)))?;

    if !(MOOD_MIN..=MOOD_MAX).contains(&contract.mood_score) {
        return Err(Error::SchemaViolation(format!(
            "mood_score {} outside [{}, {}]",
            contract.mood_score, MOOD_MIN, MOOD_MAX
        )));
    }

    Ok(JournalEntryInsight {
        mood_score: contract.mood_score,
        themes: contract.themes,
        distortions: contract.distortions,
        observation: contract.observation,
    })
}

/// Full contract: raw model text in, validated insight out
pub fn parse_insight(raw: &str) -> Result<JournalEntryInsight> {
    let value = parse_json_payload(raw)?;
    validate_insight(normalize_insight(value)?)
}

/// Read a field as text, coercing non-string scalars and defaulting null/absent
pub(crate) fn text_field(obj: &Map<String, Value>, key: &str, default: &str) -> String {
    match obj.get(key) {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_fence_variants() {
        assert_eq!(strip_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_fence("```\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
        assert_eq!(strip_fence("```json{\"a\": 1}```"), "{\"a\": 1}");
        assert_eq!(strip_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_insight_plain() {
        let raw = r#"{
            "mood_score": 6.5,
            "themes": ["work pressure", "self-doubt"],
            "distortions": ["Catastrophizing"],
            "observation": "Deadlines seem to be crowding out the things that usually restore your energy."
        }"#;
        let insight = parse_insight(raw).unwrap();
        assert_eq!(insight.mood_score, 6.5);
        assert_eq!(insight.themes, vec!["work pressure", "self-doubt"]);
        assert_eq!(insight.distortions, vec![Distortion::Catastrophizing]);
    }

    #[test]
    fn test_parse_insight_fenced() {
        let raw = "```json\n{\"mood_score\": 3, \"themes\": [], \"distortions\": [], \"observation\": \"ok\"}\n```";
        let insight = parse_insight(raw).unwrap();
        assert_eq!(insight.mood_score, 3.0);
    }

    #[test]
    fn test_malformed_output_carries_bounded_excerpt() {
        let raw = format!("Sure! {}", "x".repeat(1000));
        match parse_insight(&raw) {
            Err(Error::MalformedOutput { excerpt }) => {
                assert_eq!(excerpt.chars().count(), EXCERPT_LEN);
                assert!(excerpt.starts_with("Sure!"));
            }
            other => panic!("expected MalformedOutput, got {:?}", other),
        }
    }

    #[test]
    fn test_mood_is_clamped_and_defaulted() {
        let high = parse_insight(r#"{"mood_score": 14.2, "observation": "x"}"#).unwrap();
        assert_eq!(high.mood_score, 10.0);

        let low = parse_insight(r#"{"mood_score": -3, "observation": "x"}"#).unwrap();
        assert_eq!(low.mood_score, 1.0);

        let missing = parse_insight(r#"{"observation": "x"}"#).unwrap();
        assert_eq!(missing.mood_score, 5.0);

        let stringly = parse_insight(r#"{"mood_score": "7.5", "observation": "x"}"#).unwrap();
        assert_eq!(stringly.mood_score, 7.5);
    }

    #[test]
    fn test_mood_always_in_range_for_numeric_input() {
        for score in [-1e9, -1.0, 0.0, 0.999, 1.0, 5.5, 10.0, 10.001, 1e12, f64::MAX] {
            let raw = json!({ "mood_score": score, "observation": "x" }).to_string();
            let insight = parse_insight(&raw).unwrap();
            assert!(
                (1.0..=10.0).contains(&insight.mood_score),
                "{} -> {}",
                score,
                insight.mood_score
            );
        }

        // Literals beyond f64 range still clamp to the bounds
        let huge = parse_insight(r#"{"mood_score": 1e400, "observation": "x"}"#).unwrap();
        assert_eq!(huge.mood_score, 10.0);
        let tiny = parse_insight(r#"{"mood_score": -1e400, "observation": "x"}"#).unwrap();
        assert_eq!(tiny.mood_score, 1.0);
    }

    #[test]
    fn test_overflowing_mood_keeps_other_fields() {
        let raw = "```json\n{\"mood_score\": 2E+999, \"themes\": [\"burnout\"], \"distortions\": [\"mind reading\"], \"observation\": \"ok\"}\n```";
        let insight = parse_insight(raw).unwrap();
        assert_eq!(insight.mood_score, 10.0);
        assert_eq!(insight.themes, vec!["burnout"]);
        assert_eq!(insight.distortions, vec![Distortion::MindReading]);
        assert_eq!(insight.observation, "ok");
    }

    #[test]
    fn test_overflow_outside_object_is_still_malformed() {
        assert!(matches!(
            parse_insight("[1e400]"),
            Err(Error::MalformedOutput { .. })
        ));
        assert!(matches!(
            parse_insight(r#"{"mood_score": 1e400, "observation": "#),
            Err(Error::MalformedOutput { .. })
        ));
    }

    #[test]
    fn test_non_numeric_mood_is_schema_violation() {
        let result = parse_insight(r#"{"mood_score": "quite sad", "observation": "x"}"#);
        assert!(matches!(result, Err(Error::SchemaViolation(_))));
    }

    #[test]
    fn test_missing_fields_default() {
        let insight = parse_insight(r#"{"mood_score": 4}"#).unwrap();
        assert!(insight.themes.is_empty());
        assert!(insight.distortions.is_empty());
        assert_eq!(insight.observation, "");
    }

    #[test]
    fn test_null_observation_is_schema_violation() {
        let result = parse_insight(r#"{"mood_score": 4, "observation": null}"#);
        assert!(matches!(result, Err(Error::SchemaViolation(_))));
    }

    #[test]
    fn test_non_object_is_schema_violation() {
        let result = parse_insight(r#"[1, 2, 3]"#);
        assert!(matches!(result, Err(Error::SchemaViolation(_))));
    }

    #[test]
    fn test_themes_must_be_strings() {
        let result = parse_insight(r#"{"themes": "work", "observation": "x"}"#);
        assert!(matches!(result, Err(Error::SchemaViolation(_))));
    }

    #[test]
    fn test_unknown_distortions_dropped_any_casing() {
        let raw = r#"{
            "distortions": ["MIND READING", "labeling", "LABELING", "should statements", 42],
            "observation": "x"
        }"#;
        let insight = parse_insight(raw).unwrap();
        assert_eq!(
            insight.distortions,
            vec![Distortion::MindReading, Distortion::ShouldStatements]
        );
    }

    #[test]
    fn test_distortion_normalization_is_idempotent() {
        let inputs = vec![
            "filtering",
            "Fortune telling",
            "ALL-OR-NOTHING THINKING",
            "Filtering",
            "personalization ",
            "blame",
        ];
        let once = normalize_distortions(&inputs);
        let labels: Vec<&str> = once.iter().map(|d| d.label()).collect();
        let twice = normalize_distortions(&labels);
        assert_eq!(once, twice);
        assert_eq!(
            once,
            vec![
                Distortion::Filtering,
                Distortion::AllOrNothingThinking,
                Distortion::Personalization,
            ]
        );
    }

    #[test]
    fn test_normalize_then_validate_keeps_extra_fields_out() {
        let normalized = normalize_insight(json!({
            "mood_score": 8,
            "observation": "A steady, grounded day.",
            "confidence": 0.9
        }))
        .unwrap();
        assert_eq!(normalized["distortions"], json!([]));
        let insight = validate_insight(normalized).unwrap();
        assert_eq!(insight.observation, "A steady, grounded day.");
    }

    #[test]
    fn test_text_field_coercion() {
        let obj = json!({"a": "text", "b": 3, "c": null})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(text_field(&obj, "a", "d"), "text");
        assert_eq!(text_field(&obj, "b", "d"), "3");
        assert_eq!(text_field(&obj, "c", "d"), "d");
        assert_eq!(text_field(&obj, "missing", "d"), "d");
    }
}
