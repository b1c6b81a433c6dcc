//! API route handlers.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::info;

use tollgate_cache::CacheStats;
use tollgate_core::types::Principal;

use crate::dto::*;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let start = START_TIME.get_or_init(Instant::now);

    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: start.elapsed().as_secs(),
        cache_entries: state.cache.len(),
        cache_enabled: state.config.enable_cache,
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// Resources
// ═══════════════════════════════════════════════════════════════════════════

/// GET /api/v1/resources
pub async fn list_resources(State(state): State<Arc<AppState>>) -> Json<Vec<Resource>> {
    Json(state.catalog.list())
}

/// POST /api/v1/resources
pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResourceRequest>,
) -> Result<(StatusCode, Json<Resource>)> {
    validate_resource(&req)?;
    let resource = state.catalog.create(req);
    info!(id = resource.id, "created resource");
    Ok((StatusCode::CREATED, Json(resource)))
}

/// GET /api/v1/resources/:id
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Resource>> {
    state
        .catalog
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Resource {id} not found")))
}

/// PUT /api/v1/resources/:id
///
/// Creates the resource when the ID is free.
pub async fn put_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(req): Json<ResourceRequest>,
) -> Result<(StatusCode, Json<Resource>)> {
    validate_resource(&req)?;
    let (resource, created) = state.catalog.upsert(id, req);
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resource)))
}

/// DELETE /api/v1/resources/:id
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode> {
    state
        .catalog
        .remove(id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| ApiError::not_found(format!("Resource {id} not found")))
}

fn validate_resource(req: &ResourceRequest) -> Result<()> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be blank"));
    }
    Ok(())
}

/// GET /api/v1/me
pub async fn me(principal: Option<Extension<Principal>>) -> Result<Json<MeResponse>> {
    match principal.map(|Extension(p)| p).unwrap_or_default() {
        Principal::User(id) => Ok(Json(MeResponse { principal: id })),
        Principal::Anonymous => Err(ApiError::unauthorized("Authentication required")),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Auth flows
// ═══════════════════════════════════════════════════════════════════════════

fn accepted(flow: &str) -> (StatusCode, Json<AcceptedResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted".into(),
            flow: flow.into(),
        }),
    )
}

/// POST /api/v1/auth/login
pub async fn login() -> (StatusCode, Json<AcceptedResponse>) {
    accepted("login")
}

/// POST /api/v1/auth/register
pub async fn register() -> (StatusCode, Json<AcceptedResponse>) {
    accepted("register")
}

/// POST /api/v1/auth/password-reset
pub async fn password_reset() -> (StatusCode, Json<AcceptedResponse>) {
    accepted("password-reset")
}

/// GET /api/v1/store/products
pub async fn list_products() -> Json<Vec<Product>> {
    Json(vec![
        Product {
            sku: "TG-001".into(),
            name: "Annual pass".into(),
            price_cents: 4900,
        },
        Product {
            sku: "TG-002".into(),
            name: "Day pass".into(),
            price_cents: 500,
        },
    ])
}

// ═══════════════════════════════════════════════════════════════════════════
// Admin
// ═══════════════════════════════════════════════════════════════════════════

/// GET /api/v1/admin/cache
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// DELETE /api/v1/admin/cache
pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearCacheResponse> {
    let removed = state.cache.len();
    state.cache.clear();
    info!(removed, "cleared response cache");
    Json(ClearCacheResponse { removed })
}

/// POST /api/v1/admin/cache/invalidate
pub async fn invalidate_cache(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    let removed = state.cache.try_invalidate(&req.pattern)?;
    info!(pattern = %req.pattern, removed, "invalidated cache entries");
    Ok(Json(InvalidateResponse {
        pattern: req.pattern,
        removed,
    }))
}

/// GET /api/v1/admin/limits
pub async fn list_limits(State(state): State<Arc<AppState>>) -> Json<Vec<TierLimitDto>> {
    let limits = state
        .admission
        .tiers()
        .into_iter()
        .map(|config| {
            let tracked = state
                .admission
                .limiter(config.tier)
                .map(|l| l.tracked_clients())
                .unwrap_or(0);
            TierLimitDto::new(config, tracked)
        })
        .collect();
    Json(limits)
}
