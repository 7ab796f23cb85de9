//! Liveness endpoint

use axum::Json;
use serde_json::{json, Value};

/// GET /health - Liveness probe (no authentication)
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "service": "vesper-api"}))
}
