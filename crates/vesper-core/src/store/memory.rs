//! In-process row store
//!
//! Holds entries, embeddings and reports in memory, scoped by the caller's
//! user id. Clones share the same tables. Used by `vesper serve --store memory`
//! and throughout the tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::identity::Identity;
use crate::models::{EntryPatch, EntryRow, NewEntry, NewReport, ReportRow};

use super::{RowStore, SortOrder, VectorSearch};

#[derive(Debug, Clone)]
struct StoredEntry {
    row: EntryRow,
    embedding: Option<Vec<f32>>,
}

#[derive(Debug, Default)]
struct Tables {
    // Insertion order doubles as the tie-break for equal timestamps
    entries: Vec<StoredEntry>,
    reports: Vec<ReportRow>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed row, e.g. with a backdated `created_at`
    pub async fn seed_entry(&self, row: EntryRow, embedding: Option<Vec<f32>>) {
        self.tables
            .write()
            .await
            .entries
            .push(StoredEntry { row, embedding });
    }

    /// Stored embedding for an entry, regardless of owner
    pub async fn embedding(&self, id: Uuid) -> Option<Vec<f32>> {
        self.tables
            .read()
            .await
            .entries
            .iter()
            .find(|e| e.row.id == id)
            .and_then(|e| e.embedding.clone())
    }

    pub async fn entry_count(&self) -> usize {
        self.tables.read().await.entries.len()
    }
}

/// Newest first, later insertions first among equal timestamps
fn newest_first<T: Clone>(items: impl DoubleEndedIterator<Item = T>, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut out: Vec<T> = items.rev().collect();
    out.sort_by(|a, b| key(b).cmp(&key(a)));
    out
}

fn apply_patch(row: &mut EntryRow, embedding: &mut Option<Vec<f32>>, patch: &EntryPatch) {
    if let Some(ref content) = patch.content {
        row.content = content.clone();
    }
    if let Some(analyzed) = patch.analyzed {
        row.analyzed = analyzed;
    }
    if let Some(mood) = patch.mood_score {
        row.mood_score = Some(mood);
    }
    if let Some(ref themes) = patch.themes {
        row.themes = themes.clone();
    }
    if let Some(ref distortions) = patch.distortions {
        row.distortions = distortions.clone();
    }
    if let Some(ref observation) = patch.observation {
        row.observation = Some(observation.clone());
    }
    if let Some(ref vector) = patch.embedding {
        *embedding = Some(vector.clone());
    }
    row.updated_at = Utc::now();
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn insert_entry(&self, entry: &NewEntry, identity: &Identity) -> Result<EntryRow> {
        let now = Utc::now();
        let row = EntryRow {
            id: Uuid::new_v4(),
            user_id: identity.user_id,
            content: entry.content.clone(),
            created_at: now,
            updated_at: now,
            ..Default::default()
        };
        self.tables.write().await.entries.push(StoredEntry {
            row: row.clone(),
            embedding: None,
        });
        Ok(row)
    }

    async fn list_entries(&self, identity: &Identity) -> Result<Vec<EntryRow>> {
        let tables = self.tables.read().await;
        let owned = tables
            .entries
            .iter()
            .filter(|e| e.row.user_id == identity.user_id)
            .map(|e| e.row.clone());
        Ok(newest_first(owned, |r| r.created_at))
    }

    async fn get_entry(&self, id: Uuid, identity: &Identity) -> Result<Option<EntryRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .entries
            .iter()
            .find(|e| e.row.id == id && e.row.user_id == identity.user_id)
            .map(|e| e.row.clone()))
    }

    async fn update_entry(
        &self,
        id: Uuid,
        patch: &EntryPatch,
        identity: &Identity,
    ) -> Result<Option<EntryRow>> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables
            .entries
            .iter_mut()
            .find(|e| e.row.id == id && e.row.user_id == identity.user_id)
        else {
            return Ok(None);
        };
        apply_patch(&mut stored.row, &mut stored.embedding, patch);
        Ok(Some(stored.row.clone()))
    }

    async fn delete_entry(&self, id: Uuid, identity: &Identity) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.entries.len();
        tables
            .entries
            .retain(|e| !(e.row.id == id && e.row.user_id == identity.user_id));
        Ok(tables.entries.len() < before)
    }

    async fn analyzed_entries(
        &self,
        identity: &Identity,
        order: SortOrder,
        limit: Option<usize>,
    ) -> Result<Vec<EntryRow>> {
        let tables = self.tables.read().await;
        let analyzed = tables
            .entries
            .iter()
            .filter(|e| {
                e.row.user_id == identity.user_id && e.row.analyzed && e.row.mood_score.is_some()
            })
            .map(|e| e.row.clone());

        let mut rows = newest_first(analyzed, |r| r.created_at);
        if order == SortOrder::OldestFirst {
            rows.reverse();
        }
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert_report(&self, report: &NewReport, identity: &Identity) -> Result<ReportRow> {
        let row = ReportRow {
            id: Uuid::new_v4(),
            user_id: identity.user_id,
            created_at: Utc::now(),
            week_start: report.week_start,
            dominant_emotion: report.report.dominant_emotion.clone(),
            top_themes: report.report.top_themes.clone(),
            emotional_arc: report.report.emotional_arc.clone(),
            ai_observation: report.report.ai_observation.clone(),
        };
        self.tables.write().await.reports.push(row.clone());
        Ok(row)
    }

    async fn list_reports(&self, identity: &Identity) -> Result<Vec<ReportRow>> {
        let tables = self.tables.read().await;
        let owned = tables
            .reports
            .iter()
            .filter(|r| r.user_id == identity.user_id)
            .cloned();
        Ok(newest_first(owned, |r| r.created_at))
    }

    async fn get_report(&self, id: Uuid, identity: &Identity) -> Result<Option<ReportRow>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reports
            .iter()
            .find(|r| r.id == id && r.user_id == identity.user_id)
            .cloned())
    }
}

#[async_trait]
impl VectorSearch for MemoryStore {
    async fn nearest(
        &self,
        embedding: &[f32],
        k: usize,
        identity: &Identity,
    ) -> Result<Vec<(EntryRow, f64)>> {
        let tables = self.tables.read().await;
        let mut scored: Vec<(EntryRow, f64)> = tables
            .entries
            .iter()
            .filter(|e| e.row.user_id == identity.user_id)
            .filter_map(|e| {
                e.embedding
                    .as_ref()
                    .map(|v| (e.row.clone(), cosine_similarity(embedding, v)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}
