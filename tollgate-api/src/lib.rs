//! # Tollgate API Server
//!
//! HTTP front for the Tollgate cache and admission layer. Every request passes
//! through tiered admission control first; cacheable reads are then served
//! from the response cache and successful writes invalidate what they touch.
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness, exempt from admission
//! - `GET|POST /api/v1/resources` - List or create resources (cached family)
//! - `GET|PUT|DELETE /api/v1/resources/:id` - Read, upsert or delete one resource
//! - `GET /api/v1/me` - Caller identity, cached per principal
//! - `POST /api/v1/auth/{login,register,password-reset}` - Auth flows (strict tiers)
//! - `GET /api/v1/store/products` - Product list (store tier, 60 s TTL)
//! - `GET|DELETE /api/v1/admin/cache` - Cache stats or clear
//! - `POST /api/v1/admin/cache/invalidate` - Invalidate by pattern
//! - `GET /api/v1/admin/limits` - Tier budgets
//!
//! ## Example
//!
//! ```rust,ignore
//! use tollgate_api::{ApiConfig, ApiServer};
//!
//! let server = ApiServer::new(ApiConfig::from_env()?)?;
//! server.run(([0, 0, 0, 0], 3001)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod catalog;
mod dto;
mod error;
mod handlers;
mod middleware;
mod policy;
mod routes;
mod state;

pub use error::{ApiError, RateLimited};
pub use middleware::{admission, protect, resolve_principal, response_cache, CachedResponse};
pub use policy::{CacheRule, CacheScope, RoutePolicy};
pub use routes::create_router;
pub use state::{ApiConfig, AppState};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tollgate_cache::spawn_sweeper;
use tollgate_core::error::Result;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// API server for Tollgate.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Creates a new API server with the given configuration.
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self {
            state: Arc::new(AppState::new(config)?),
        })
    }

    /// Returns the shared state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Creates the protected router with all routes configured.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        protect(create_router(self.state.clone()), self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Runs the server on the given address.
    ///
    /// The cache sweeper lives as long as the server.
    pub async fn run(self, addr: impl Into<SocketAddr>) -> std::io::Result<()> {
        let addr = addr.into();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        let _sweeper = self.state.config.enable_cache.then(|| {
            spawn_sweeper(&self.state.cache, self.state.cache.config().sweep_interval())
        });

        info!(%addr, cache = self.state.config.enable_cache, "Tollgate API server listening");

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}
