//! API route configuration.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
///
/// The router is unprotected; wrap it with [`protect`](crate::protect) to add
/// admission control and response caching.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Resources
        .route(
            "/api/v1/resources",
            get(handlers::list_resources).post(handlers::create_resource),
        )
        .route(
            "/api/v1/resources/:id",
            get(handlers::get_resource)
                .put(handlers::put_resource)
                .delete(handlers::delete_resource),
        )
        .route("/api/v1/me", get(handlers::me))

        // Auth flows
        .route("/api/v1/auth/login", post(handlers::login))
        .route("/api/v1/auth/register", post(handlers::register))
        .route("/api/v1/auth/password-reset", post(handlers::password_reset))

        // Store
        .route("/api/v1/store/products", get(handlers::list_products))

        // Admin
        .route(
            "/api/v1/admin/cache",
            get(handlers::cache_stats).delete(handlers::clear_cache),
        )
        .route("/api/v1/admin/cache/invalidate", post(handlers::invalidate_cache))
        .route("/api/v1/admin/limits", get(handlers::list_limits))

        .with_state(state)
}
