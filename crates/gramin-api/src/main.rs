//! gramin-api - HTTP API server for the village auto-linking service

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use gramin_core::{defaults, ItemKind, LinkJob, Role, RoleLookup, ScanMode, Suggestion};
use gramin_db::Database;
use gramin_linking::{
    BulkImporter, ImportItem, LinkCoordinator, MemoryCooldownStore, ScanService, ScanWorker,
    TriggerScanRequest, VillageLinkRepository, VillageRepository, WorkerConfig,
};
use gramin_core::AuditRepository;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation and debugging production incidents.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    scans: ScanService,
    coordinator: LinkCoordinator,
    importer: BulkImporter,
    /// Optional downstream cache invalidation webhook (PURGE_WEBHOOK_URL).
    purge_webhook: Option<String>,
    http: reqwest::Client,
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "gramin_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "gramin_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("gramin-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/gramin".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Assemble services over the repository set
    let scans = ScanService::new(
        db.villages.clone(),
        db.candidates.clone(),
        db.jobs.clone(),
        db.suggestions.clone(),
        db.links.clone(),
        Arc::new(MemoryCooldownStore::new()),
    );
    let coordinator = LinkCoordinator::new(
        db.suggestions.clone(),
        db.links.clone(),
        db.audit.clone(),
        db.roles.clone(),
    );
    let importer = BulkImporter::new(db.villages.clone(), db.links.clone());

    // Start the scan worker, woken by job creation
    info!("Starting scan worker...");
    let _worker_handle = ScanWorker::new(scans.clone(), WorkerConfig::from_env())
        .with_wake(db.jobs.job_notify())
        .start();
    info!("Scan worker started");

    let purge_webhook = std::env::var("PURGE_WEBHOOK_URL").ok();
    if let Some(ref url) = purge_webhook {
        info!(webhook = %url, "Cache purge forwarding enabled");
    }

    let state = AppState {
        db,
        scans,
        coordinator,
        importer,
        purge_webhook,
        http: reqwest::Client::new(),
    };

    let app = Router::new()
        // Health
        .route("/health", get(health_check))
        // Scan jobs
        .route("/api/v1/villages/:id/scan", post(trigger_scan))
        .route("/api/v1/villages/:id/link-jobs", get(list_jobs))
        .route("/api/v1/link-jobs/:id", get(get_job))
        .route("/api/v1/link-jobs/:id/commit", post(commit_suggestions))
        // Links
        .route(
            "/api/v1/villages/:id/links",
            get(list_links),
        )
        .route("/api/v1/villages/:id/links/import", post(import_links))
        .route("/api/v1/villages/:id/links/unlink", post(unlink))
        // Audit
        .route("/api/v1/villages/:id/link-audit", get(audit_trail))
        .route("/api/v1/link-audit/:id/rollback", post(rollback_audit))
        // Cache purge notification hook
        .route("/api/v1/cache/purge", post(purge_cache))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600))
        })
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_BYTES))
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Parse allowed origins from the comma-separated `ALLOWED_ORIGINS` variable.
///
/// Strict origin whitelisting; unparseable entries are logged and dropped.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());

    if origins_str.trim().is_empty() {
        return vec![HeaderValue::from_static("http://localhost:3000")];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

// =============================================================================
// AUTHENTICATION
// =============================================================================

/// Extractor for authenticated requests.
///
/// The Bearer token is the opaque admin-user id issued by the identity
/// collaborator; this extractor resolves it to a role through `RoleLookup`.
/// Missing, malformed, or unknown tokens reject with 401.
#[derive(Debug, Clone)]
struct Auth {
    user_id: Uuid,
    role: Role,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Auth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                header.trim_start_matches("Bearer ").trim()
            }
            _ => {
                return Err(ApiError::Unauthorized(
                    "Missing Authorization header".to_string(),
                ))
            }
        };

        let user_id = Uuid::parse_str(token)
            .map_err(|_| ApiError::Unauthorized("Malformed bearer token".to_string()))?;

        match state.db.roles.role_for(user_id).await? {
            Some(role) => Ok(Auth { user_id, role }),
            None => Err(ApiError::Unauthorized("Unknown user".to_string())),
        }
    }
}

/// Extractor requiring any admin-tier role.
#[derive(Debug, Clone)]
struct RequireAdminTier {
    user_id: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireAdminTier {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = Auth::from_request_parts(parts, state).await?;
        if !auth.role.is_admin_tier() {
            return Err(ApiError::Forbidden("Admin role required".to_string()));
        }
        Ok(RequireAdminTier {
            user_id: auth.user_id,
        })
    }
}

/// Extractor requiring the super_admin role.
#[derive(Debug, Clone)]
struct RequireSuperAdmin {
    user_id: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = Auth::from_request_parts(parts, state).await?;
        if !auth.role.is_super_admin() {
            return Err(ApiError::Forbidden("super_admin required".to_string()));
        }
        Ok(RequireSuperAdmin {
            user_id: auth.user_id,
        })
    }
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// SCAN JOB HANDLERS
// =============================================================================

#[derive(Debug, Deserialize)]
struct TriggerScanBody {
    /// "fuzzy" (default) or "geo".
    mode: Option<String>,
    radius_meters: Option<i32>,
    limit: Option<i32>,
}

async fn trigger_scan(
    State(state): State<AppState>,
    Path(village_id): Path<Uuid>,
    admin: RequireAdminTier,
    Json(body): Json<TriggerScanBody>,
) -> Result<impl IntoResponse, ApiError> {
    let mode = match body.mode.as_deref() {
        None => ScanMode::Fuzzy,
        Some(s) => ScanMode::parse(s)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown scan mode \"{s}\"")))?,
    };

    let job_id = state
        .scans
        .trigger(TriggerScanRequest {
            village_id,
            mode,
            radius_meters: body.radius_meters,
            limit: body.limit,
            actor: admin.user_id,
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "job_id": job_id,
            "status": "queued",
        })),
    ))
}

#[derive(Debug, Serialize)]
struct JobDetailResponse {
    job: LinkJob,
    suggestions: Vec<Suggestion>,
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    _admin: RequireAdminTier,
) -> Result<impl IntoResponse, ApiError> {
    let (job, suggestions) = state.scans.get_job(job_id).await?;
    Ok(Json(JobDetailResponse { job, suggestions }))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

impl PageQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(defaults::PAGE_LIMIT).clamp(1, 500)
    }

    fn offset(&self) -> i64 {
        self.offset.unwrap_or(defaults::PAGE_OFFSET).max(0)
    }
}

async fn list_jobs(
    State(state): State<AppState>,
    Path(village_id): Path<Uuid>,
    _admin: RequireAdminTier,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let jobs = state
        .scans
        .list_jobs(village_id, page.limit(), page.offset())
        .await?;
    Ok(Json(serde_json::json!({
        "data": jobs,
        "limit": page.limit(),
        "offset": page.offset(),
    })))
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    suggestion_ids: Vec<Uuid>,
}

async fn commit_suggestions(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
    admin: RequireAdminTier,
    Json(body): Json<CommitBody>,
) -> Result<impl IntoResponse, ApiError> {
    if body.suggestion_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "suggestion_ids must not be empty".to_string(),
        ));
    }

    let outcome = state
        .coordinator
        .commit(job_id, &body.suggestion_ids, admin.user_id)
        .await?;
    Ok(Json(outcome))
}

// =============================================================================
// LINK HANDLERS
// =============================================================================

async fn list_links(
    State(state): State<AppState>,
    Path(village_id): Path<Uuid>,
    _admin: RequireAdminTier,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.villages.fetch(village_id).await?;
    let links = state
        .db
        .links
        .list_for_village(village_id, page.limit(), page.offset())
        .await?;
    Ok(Json(serde_json::json!({
        "data": links,
        "limit": page.limit(),
        "offset": page.offset(),
    })))
}

#[derive(Debug, Deserialize)]
struct ImportBody {
    items: Vec<ImportItem>,
}

async fn import_links(
    State(state): State<AppState>,
    Path(village_id): Path<Uuid>,
    admin: RequireAdminTier,
    Json(body): Json<ImportBody>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .importer
        .import(village_id, body.items, admin.user_id)
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct UnlinkBody {
    item_type: String,
    item_id: Uuid,
    reason: Option<String>,
}

async fn unlink(
    State(state): State<AppState>,
    Path(village_id): Path<Uuid>,
    admin: RequireAdminTier,
    Json(body): Json<UnlinkBody>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = ItemKind::parse(&body.item_type)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown item_type \"{}\"", body.item_type)))?;

    let entry = state
        .coordinator
        .unlink(village_id, kind, body.item_id, admin.user_id, body.reason)
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "audit_id": entry.id,
    })))
}

// =============================================================================
// AUDIT HANDLERS
// =============================================================================

async fn audit_trail(
    State(state): State<AppState>,
    Path(village_id): Path<Uuid>,
    _admin: RequireAdminTier,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.villages.fetch(village_id).await?;
    let entries = state
        .db
        .audit
        .list_for_village(village_id, page.limit(), page.offset())
        .await?;
    Ok(Json(serde_json::json!({
        "data": entries,
        "limit": page.limit(),
        "offset": page.offset(),
    })))
}

#[derive(Debug, Deserialize)]
struct RollbackBody {
    reason: String,
}

async fn rollback_audit(
    State(state): State<AppState>,
    Path(audit_id): Path<Uuid>,
    admin: RequireSuperAdmin,
    Json(body): Json<RollbackBody>,
) -> Result<impl IntoResponse, ApiError> {
    let entry = state
        .coordinator
        .rollback(audit_id, &body.reason, admin.user_id)
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "rollback_audit_id": entry.id,
    })))
}

// =============================================================================
// CACHE PURGE
// =============================================================================

#[derive(Debug, Deserialize)]
struct PurgeCacheBody {
    village_slug: String,
}

/// Notification hook only: this service does not own cache invalidation.
/// The request is validated, logged, and optionally forwarded to the
/// configured webhook.
async fn purge_cache(
    State(state): State<AppState>,
    admin: RequireAdminTier,
    Json(body): Json<PurgeCacheBody>,
) -> Result<impl IntoResponse, ApiError> {
    let village = state
        .db
        .villages
        .fetch_by_slug(&body.village_slug)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Village with slug \"{}\"", body.village_slug))
        })?;

    info!(
        village_id = %village.id,
        village_slug = %body.village_slug,
        actor = %admin.user_id,
        "Cache purge requested"
    );

    let mut message = format!("Purge recorded for \"{}\"", body.village_slug);
    if let Some(ref url) = state.purge_webhook {
        let payload = serde_json::json!({
            "village_slug": body.village_slug,
            "village_id": village.id,
        });
        match state.http.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                message = format!("Purge forwarded for \"{}\"", body.village_slug);
            }
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "Purge webhook returned an error status");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Purge webhook delivery failed");
            }
        }
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": message,
    })))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Internal(gramin_core::Error),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    RateLimited(String),
}

impl From<gramin_core::Error> for ApiError {
    fn from(err: gramin_core::Error) -> Self {
        use gramin_core::Error;
        match err {
            Error::NotFound(_)
            | Error::VillageNotFound(_)
            | Error::JobNotFound(_)
            | Error::AuditNotFound(_) => ApiError::NotFound(err.to_string()),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Forbidden(msg) => ApiError::Forbidden(msg),
            Error::RateLimited { .. } => ApiError::RateLimited(err.to_string()),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                // The underlying cause is logged, never surfaced.
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gramin_core::Error;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_error_mapping_not_found_family() {
        let id = Uuid::new_v4();
        for err in [
            Error::NotFound("x".into()),
            Error::VillageNotFound(id),
            Error::JobNotFound(id),
            Error::AuditNotFound(id),
        ] {
            assert_eq!(status_of(ApiError::from(err)), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_error_mapping_rate_limited() {
        let err = Error::RateLimited {
            retry_after_mins: 9,
        };
        let api_err = ApiError::from(err);
        match &api_err {
            ApiError::RateLimited(msg) => {
                assert!(msg.contains("9 minute(s)"));
            }
            other => panic!("Expected RateLimited, got {other:?}"),
        }
        assert_eq!(status_of(api_err), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_error_mapping_auth() {
        assert_eq!(
            status_of(ApiError::from(Error::Unauthorized("no token".into()))),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::from(Error::Forbidden("nope".into()))),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_error_mapping_invalid_input() {
        assert_eq!(
            status_of(ApiError::from(Error::InvalidInput("bad".into()))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_internal_errors_withhold_details() {
        let err = Error::Internal("secret pool state".into());
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_request_id_is_uuid_v7() {
        let mut maker = MakeRequestUuidV7;
        let req = axum::http::Request::builder().body(()).unwrap();
        let id = maker.make_request_id(&req).unwrap();
        let parsed = Uuid::parse_str(id.header_value().to_str().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn test_parse_allowed_origins_default() {
        std::env::remove_var("ALLOWED_ORIGINS");
        let origins = parse_allowed_origins();
        assert_eq!(origins, vec![HeaderValue::from_static("http://localhost:3000")]);
    }

    #[test]
    fn test_page_query_clamps() {
        let page = PageQuery {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), 500);
        assert_eq!(page.offset(), 0);

        let page = PageQuery {
            limit: None,
            offset: None,
        };
        assert_eq!(page.limit(), defaults::PAGE_LIMIT);
        assert_eq!(page.offset(), defaults::PAGE_OFFSET);
    }
}
