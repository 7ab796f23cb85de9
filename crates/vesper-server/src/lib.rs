//! Vesper Web Server
//!
//! Axum-based REST API for the Vesper journaling assistant.
//!
//! Security features:
//! - Every `/api` route requires a caller bearer token; rows are scoped to its subject
//! - Restrictive CORS policy driven by `FRONTEND_URL`
//! - Sanitized error responses

use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vesper_core::{
    store, AIBackend, AnalysisState, Error as CoreError, Identity, InsightPipeline, ModelGateway,
    PromptLibrary, ProviderConfig, ReportSynthesizer, SimilarityRanker, StoreConfig, Stores,
};

mod handlers;

/// Default CORS origin (Vite dev server)
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: parse_origins(DEFAULT_FRONTEND_URL),
        }
    }
}

impl ServerConfig {
    /// Read `FRONTEND_URL` (comma-separated origins)
    pub fn from_env() -> Self {
        let raw = std::env::var("FRONTEND_URL").unwrap_or_else(|_| DEFAULT_FRONTEND_URL.into());
        Self {
            allowed_origins: parse_origins(&raw),
        }
    }
}

/// Split a comma-separated origin list, dropping blanks
pub fn parse_origins(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub stores: Stores,
    pub gateway: ModelGateway,
    pub pipeline: InsightPipeline,
    pub ranker: SimilarityRanker,
    pub synthesizer: ReportSynthesizer,
    pub config: ServerConfig,
    /// Background analyses that may still be running
    analysis_tasks: Mutex<Vec<JoinHandle<AnalysisState>>>,
}

impl AppState {
    /// Wire the pipeline, ranker and synthesizer around one gateway handle
    pub fn new(
        stores: Stores,
        gateway: ModelGateway,
        prompts: PromptLibrary,
        config: ServerConfig,
    ) -> Self {
        let prompts = Arc::new(prompts);
        Self {
            pipeline: InsightPipeline::new(gateway.clone(), stores.rows.clone(), prompts.clone()),
            ranker: SimilarityRanker::new(gateway.clone(), stores.vectors.clone()),
            synthesizer: ReportSynthesizer::new(gateway.clone(), prompts),
            stores,
            gateway,
            config,
            analysis_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Build state from provider and store settings
    ///
    /// The provider client itself is only built on first use, so missing
    /// provider credentials do not stop the server from starting.
    pub fn from_config(
        provider: ProviderConfig,
        store_config: &StoreConfig,
        prompts: PromptLibrary,
        config: ServerConfig,
    ) -> anyhow::Result<Self> {
        let stores = store::from_config(store_config)?;
        Ok(Self::new(stores, ModelGateway::new(provider), prompts, config))
    }

    /// Start background analysis for an entry without waiting on it
    pub fn schedule_analysis(&self, entry_id: Uuid, content: String, identity: Identity) {
        let handle = self.pipeline.spawn(entry_id, content, identity);
        let mut tasks = self
            .analysis_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Wait until every analysis scheduled so far has written its outcome
    pub async fn drain_analysis(&self) {
        let pending = std::mem::take(
            &mut *self
                .analysis_tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in pending {
            if let Err(e) = handle.await {
                error!(error = %e, "Analysis task did not complete");
            }
        }
    }
}

/// Authentication middleware - resolves the caller identity from the bearer token
///
/// The token is forwarded to the row store as-is; the store enforces
/// ownership. The resolved [`Identity`] is attached as a request extension.
async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match Identity::from_authorization(header) {
        Ok(identity) => {
            debug!(user = %identity.user_id, path = %request.uri().path(), "Authenticated via bearer token");
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(e) => {
            warn!(path = %request.uri().path(), error = %e, "Unauthorized request");
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "Authentication required"
                })),
            )
                .into_response()
        }
    }
}

/// Create the application router
pub fn create_router(state: impl Into<Arc<AppState>>) -> Router {
    let state: Arc<AppState> = state.into();

    let api_routes = Router::new()
        // Entries
        .route(
            "/entries",
            get(handlers::list_entries).post(handlers::create_entry),
        )
        .route("/entries/search", post(handlers::search_entries))
        .route(
            "/entries/:id",
            get(handlers::get_entry)
                .put(handlers::update_entry)
                .delete(handlers::delete_entry),
        )
        .route("/entries/:id/analysis", get(handlers::get_entry_analysis))
        // Reports
        .route("/reports", get(handlers::list_reports))
        .route("/reports/generate", post(handlers::generate_report))
        .route("/reports/:id", get(handlers::get_report))
        // Drift timeline
        .route("/drift/themes", get(handlers::drift_themes))
        .route("/drift/timeline", get(handlers::drift_timeline))
        // Dashboard
        .route("/dashboard/stats", get(handlers::dashboard_stats))
        .layer(middleware::from_fn(auth_middleware));

    // Build CORS layer
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let cors = if state.config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    check_ai_connection(&state.gateway).await;

    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log AI backend connection status
async fn check_ai_connection(gateway: &ModelGateway) {
    let missing = gateway.config().missing();
    if !missing.is_empty() {
        warn!(
            "⚠️  AI provider not configured (missing {}); entries will get fallback analysis",
            missing.join(", ")
        );
        return;
    }

    match gateway.client() {
        Ok(client) if client.health_check().await => {
            info!("✅ AI backend connected: {} (model: {})", client.host(), client.model());
        }
        Ok(client) => {
            warn!(
                "⚠️  AI backend configured but not responding: {} (model: {})",
                client.host(),
                client.model()
            );
        }
        Err(e) => warn!(error = %e, "⚠️  AI backend could not be initialized"),
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unprocessable(msg: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn with_internal(status: StatusCode, message: &str, err: CoreError) -> Self {
        Self {
            status,
            message: message.to_string(),
            internal: Some(err.into()),
        }
    }

    /// Map a core error onto a status, keeping provider details out of the body
    fn from_core(err: CoreError) -> Self {
        match err {
            CoreError::EmptyInput(msg) => Self::unprocessable(&msg),
            CoreError::InvalidInput(msg) => Self::bad_request(&msg),
            CoreError::NotFound(msg) => Self::not_found(&msg),
            CoreError::Unauthorized(_) => Self {
                status: StatusCode::UNAUTHORIZED,
                message: "Authentication required".to_string(),
                internal: None,
            },
            e @ CoreError::Configuration(_) => Self::with_internal(
                StatusCode::SERVICE_UNAVAILABLE,
                "AI provider is not configured",
                e,
            ),
            e @ (CoreError::Transport(_)
            | CoreError::MalformedOutput { .. }
            | CoreError::SchemaViolation(_)) => {
                Self::with_internal(StatusCode::BAD_GATEWAY, "AI provider request failed", e)
            }
            e => Self::with_internal(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred",
                e,
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, status = %self.status, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        match err.into().downcast::<CoreError>() {
            Ok(core) => Self::from_core(core),
            Err(err) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            },
        }
    }
}
