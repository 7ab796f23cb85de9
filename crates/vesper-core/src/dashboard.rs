//! Date-bucketed aggregates for the dashboard and drift timeline
//!
//! All functions are pure over rows already fetched for one caller. Days are
//! UTC calendar days of `created_at`.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{DistortionRecord, EntryRow};

pub const SPARKLINE_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparkPoint {
    pub date: NaiveDate,
    pub mood: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestAnalysis {
    pub mood_score: Option<f64>,
    pub themes: Vec<String>,
    pub distortions: Vec<DistortionRecord>,
    pub observation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub current_streak: u32,
    pub mood_sparkline: Vec<SparkPoint>,
    pub latest_analysis: Option<LatestAnalysis>,
}

/// Lightweight row for the mood-over-time chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub mood_score: Option<f64>,
    pub themes: Vec<String>,
    pub observation: Option<String>,
}

impl From<&EntryRow> for TimelinePoint {
    fn from(row: &EntryRow) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            mood_score: row.mood_score,
            themes: row.themes.clone(),
            observation: row.observation.clone(),
        }
    }
}

impl DashboardStats {
    /// `entries` must be newest first
    pub fn compute(entries: &[EntryRow], today: NaiveDate) -> Self {
        Self {
            current_streak: current_streak(entries.iter().map(|e| e.created_at.date_naive()), today),
            mood_sparkline: mood_sparkline(entries, today),
            latest_analysis: latest_analysis(entries),
        }
    }
}

/// Consecutive days with at least one entry, ending today or yesterday
///
/// A day without an entry yet does not break the streak until it is over.
pub fn current_streak(dates: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> u32 {
    let days: HashSet<NaiveDate> = dates.into_iter().collect();

    let mut check = today;
    if !days.contains(&check) {
        check -= Duration::days(1);
    }

    let mut streak = 0;
    while days.contains(&check) {
        streak += 1;
        check -= Duration::days(1);
    }
    streak
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Average mood per day for the last seven days, oldest first
pub fn mood_sparkline(entries: &[EntryRow], today: NaiveDate) -> Vec<SparkPoint> {
    (0..SPARKLINE_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let moods: Vec<f64> = entries
                .iter()
                .filter(|e| e.created_at.date_naive() == date)
                .filter_map(|e| e.mood_score)
                .collect();
            let mood = if moods.is_empty() {
                None
            } else {
                Some(round1(moods.iter().sum::<f64>() / moods.len() as f64))
            };
            SparkPoint { date, mood }
        })
        .collect()
}

/// Insight fields of the first analyzed entry (`entries` newest first)
pub fn latest_analysis(entries: &[EntryRow]) -> Option<LatestAnalysis> {
    entries.iter().find(|e| e.analyzed).map(|e| LatestAnalysis {
        mood_score: e.mood_score,
        themes: e.themes.clone(),
        distortions: e.distortions.clone(),
        observation: e.observation.clone(),
    })
}

/// Distinct non-blank themes, trimmed and sorted
pub fn distinct_themes(entries: &[EntryRow]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|e| e.themes.iter())
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Timeline points, keeping only entries with a theme containing `theme`
/// (case-insensitive) when a filter is given
pub fn filter_timeline(entries: &[EntryRow], theme: Option<&str>) -> Vec<TimelinePoint> {
    let term = theme
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty());

    entries
        .iter()
        .filter(|e| match term {
            Some(ref term) => e.themes.iter().any(|t| t.to_lowercase().contains(term)),
            None => true,
        })
        .map(TimelinePoint::from)
        .collect()
}
