//! Weekly report handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::{AppError, AppState};
use vesper_core::report::{week_start, MAX_REPORT_ENTRIES};
use vesper_core::{Identity, NewReport, ReportRow, SortOrder};

/// POST /api/reports/generate - Synthesize and store a report from recent entries
///
/// Uses the seven most recent analyzed entries; 422 if there are none.
pub async fn generate_report(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<(StatusCode, Json<ReportRow>), AppError> {
    let entries = state
        .stores
        .rows
        .analyzed_entries(&identity, SortOrder::NewestFirst, Some(MAX_REPORT_ENTRIES))
        .await?;

    if entries.is_empty() {
        return Err(AppError::unprocessable(
            "No analyzed entries found. Write and save some journal entries first.",
        ));
    }

    let report = state.synthesizer.synthesize(&entries).await?;
    let row = state
        .stores
        .rows
        .insert_report(
            &NewReport {
                user_id: identity.user_id,
                week_start: week_start(Utc::now().date_naive()),
                report,
            },
            &identity,
        )
        .await?;

    info!(report_id = %row.id, entries = entries.len(), week_start = %row.week_start, "Report stored");
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/reports - List the caller's reports, newest first
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<ReportRow>>, AppError> {
    Ok(Json(state.stores.rows.list_reports(&identity).await?))
}

/// GET /api/reports/:id - Get a specific report
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReportRow>, AppError> {
    let row = state
        .stores
        .rows
        .get_report(id, &identity)
        .await?
        .ok_or_else(|| {
            AppError::not_found(&format!("Report {} not found or does not belong to you.", id))
        })?;
    Ok(Json(row))
}
