//! Drift timeline handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState};
use vesper_core::dashboard::{distinct_themes, filter_timeline};
use vesper_core::{Identity, SortOrder, TimelinePoint};

/// Query parameters for the timeline
#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    /// Case-insensitive theme substring
    pub theme: Option<String>,
}

/// GET /api/drift/themes - Distinct themes across analyzed entries, sorted
pub async fn drift_themes(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<String>>, AppError> {
    let entries = state
        .stores
        .rows
        .analyzed_entries(&identity, SortOrder::NewestFirst, None)
        .await?;
    Ok(Json(distinct_themes(&entries)))
}

/// GET /api/drift/timeline - Analyzed entries oldest first for the mood chart
pub async fn drift_timeline(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelinePoint>>, AppError> {
    let entries = state
        .stores
        .rows
        .analyzed_entries(&identity, SortOrder::OldestFirst, None)
        .await?;
    Ok(Json(filter_timeline(&entries, params.theme.as_deref())))
}
