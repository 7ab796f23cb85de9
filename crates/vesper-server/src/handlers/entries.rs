//! Journal entry handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{AppError, AppState};
use vesper_core::{
    DistortionRecord, EntryPatch, EntryRow, Identity, NewEntry, SimilarityMatch,
};

/// Request body for creating or editing an entry
#[derive(Debug, Deserialize)]
pub struct EntryContentRequest {
    pub content: String,
}

impl EntryContentRequest {
    fn validated(self) -> Result<String, AppError> {
        if self.content.is_empty() {
            return Err(AppError::unprocessable("content must not be empty"));
        }
        Ok(self.content)
    }
}

/// Request body for semantic search
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
}

/// Lightweight view polled by the client while analysis runs
#[derive(Debug, Serialize)]
pub struct AnalysisView {
    pub entry_id: Uuid,
    pub analyzed: bool,
    pub mood_score: Option<f64>,
    pub themes: Vec<String>,
    pub distortions: Vec<DistortionRecord>,
    pub observation: Option<String>,
}

impl From<EntryRow> for AnalysisView {
    fn from(row: EntryRow) -> Self {
        Self {
            entry_id: row.id,
            analyzed: row.analyzed,
            mood_score: row.mood_score,
            themes: row.themes,
            distortions: row.distortions,
            observation: row.observation,
        }
    }
}

/// Response for entry deletion
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
    pub deleted: bool,
}

fn entry_not_found(id: Uuid) -> AppError {
    AppError::not_found(&format!("Entry {} not found or does not belong to you.", id))
}

/// POST /api/entries - Create an entry and start analysis in the background
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<EntryContentRequest>,
) -> Result<(StatusCode, Json<EntryRow>), AppError> {
    let content = req.validated()?;

    let row = state
        .stores
        .rows
        .insert_entry(
            &NewEntry {
                user_id: identity.user_id,
                content,
            },
            &identity,
        )
        .await?;

    info!(entry_id = %row.id, "Entry created, analysis scheduled");
    // The response does not wait for analysis
    state.schedule_analysis(row.id, row.content.clone(), identity);

    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/entries - List the caller's entries, newest first
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<EntryRow>>, AppError> {
    Ok(Json(state.stores.rows.list_entries(&identity).await?))
}

/// GET /api/entries/:id - Get a specific entry
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<EntryRow>, AppError> {
    let row = state
        .stores
        .rows
        .get_entry(id, &identity)
        .await?
        .ok_or_else(|| entry_not_found(id))?;
    Ok(Json(row))
}

/// GET /api/entries/:id/analysis - Poll analysis fields for an entry
pub async fn get_entry_analysis(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalysisView>, AppError> {
    let row = state
        .stores
        .rows
        .get_entry(id, &identity)
        .await?
        .ok_or_else(|| entry_not_found(id))?;
    Ok(Json(AnalysisView::from(row)))
}

/// PUT /api/entries/:id - Replace content, reset analysis and re-run it
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<EntryContentRequest>,
) -> Result<Json<EntryRow>, AppError> {
    let content = req.validated()?;

    let row = state
        .stores
        .rows
        .update_entry(id, &EntryPatch::content_edit(&content), &identity)
        .await?
        .ok_or_else(|| entry_not_found(id))?;

    info!(entry_id = %id, "Entry updated, re-analysis scheduled");
    state.schedule_analysis(id, content, identity);

    Ok(Json(row))
}

/// DELETE /api/entries/:id - Delete an entry
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, AppError> {
    if !state.stores.rows.delete_entry(id, &identity).await? {
        return Err(entry_not_found(id));
    }
    info!(entry_id = %id, "Entry deleted");
    Ok(Json(DeletedResponse { id, deleted: true }))
}

/// POST /api/entries/search - Entries ranked by semantic similarity to a query
pub async fn search_entries(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<Vec<SimilarityMatch>>, AppError> {
    let matches = state
        .ranker
        .search(&req.query, req.limit, &identity)
        .await?;
    Ok(Json(matches))
}
