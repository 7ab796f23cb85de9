//! Dashboard handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::{AppError, AppState};
use vesper_core::{DashboardStats, Identity};

/// GET /api/dashboard/stats - Streak, 7-day mood sparkline and latest analysis
pub async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<DashboardStats>, AppError> {
    let entries = state.stores.rows.list_entries(&identity).await?;
    Ok(Json(DashboardStats::compute(
        &entries,
        Utc::now().date_naive(),
    )))
}
