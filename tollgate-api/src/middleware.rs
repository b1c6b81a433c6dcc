//! Admission, identity and response-cache layers.
//!
//! Layers run outermost first: `admission` decides before anything else
//! executes, `resolve_principal` attaches the caller identity, and
//! `response_cache` serves or captures reads and invalidates after writes.
//! A rejected request never reaches the cache or the handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    Router,
};
use bytes::Bytes;
use tracing::{debug, warn};

use tollgate_core::constants::{
    CACHE_STATUS_HEADER, PRINCIPAL_HEADER, RATE_LIMIT_LIMIT_HEADER, RATE_LIMIT_REMAINING_HEADER,
    RATE_LIMIT_RESET_HEADER,
};
use tollgate_core::error::TollgateError;
use tollgate_core::keys::cache_key;
use tollgate_core::types::{ClientId, Decision, Principal, Quota};

use crate::error::{whole_seconds, RateLimited};
use crate::policy::{CacheRule, CacheScope};
use crate::state::AppState;

const UNKNOWN_CLIENT: &str = "unknown";

/// A captured 200 response.
#[derive(Clone, Debug)]
pub struct CachedResponse {
    headers: HeaderMap,
    body: Bytes,
}

impl CachedResponse {
    fn to_response(&self, cache_status: &'static str) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.headers_mut() = self.headers.clone();
        response
            .headers_mut()
            .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(cache_status));
        response
    }

    #[cfg(test)]
    pub(crate) fn for_tests(body: &'static str) -> Self {
        Self {
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }
}

/// Wraps `router` in the admission, identity and cache layers.
pub fn protect(router: Router, state: Arc<AppState>) -> Router {
    router
        .layer(from_fn_with_state(state.clone(), response_cache))
        .layer(from_fn_with_state(state.clone(), resolve_principal))
        .layer(from_fn_with_state(state, admission))
}

// ═══════════════════════════════════════════════════════════════════════════
// Admission
// ═══════════════════════════════════════════════════════════════════════════

/// Counts the request against its tier and rejects it with 429 when over
/// budget. Allowed responses carry the remaining quota.
pub async fn admission(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if state.policy.is_exempt(&path) {
        return next.run(request).await;
    }

    let tier = state.policy.tier_for(&path);
    let client = ClientId::new(client_address(&request, state.config.trust_proxy_headers))
        .with_path(path);

    match state.admission.admit(tier, &client) {
        Decision::Allowed(quota) => {
            let mut response = next.run(request).await;
            apply_quota_headers(response.headers_mut(), &quota);
            response
        }
        Decision::Rejected { retry_after } => RateLimited::new(tier, retry_after).into_response(),
    }
}

/// Network origin of the request. Proxy headers are honored only when the
/// deployment sits behind a trusted proxy.
fn client_address(request: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let headers = request.headers();
        let forwarded = headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .or_else(|| {
                headers
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn apply_quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(quota.limit));
    headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(quota.remaining));
    headers.insert(
        RATE_LIMIT_RESET_HEADER,
        HeaderValue::from(whole_seconds(quota.reset_after)),
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Identity
// ═══════════════════════════════════════════════════════════════════════════

/// Attaches the caller's [`Principal`] to the request.
///
/// An identity inserted by an outer layer wins. Otherwise the principal
/// header is read when trusted, and everyone else is anonymous.
pub async fn resolve_principal(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<Principal>().is_none() {
        let principal = if state.config.trust_principal_header {
            Principal::from_optional(
                request
                    .headers()
                    .get(PRINCIPAL_HEADER)
                    .and_then(|h| h.to_str().ok()),
            )
        } else {
            Principal::Anonymous
        };
        request.extensions_mut().insert(principal);
    }
    next.run(request).await
}

// ═══════════════════════════════════════════════════════════════════════════
// Response cache
// ═══════════════════════════════════════════════════════════════════════════

/// Serves cacheable GETs from the cache and invalidates after writes.
///
/// Cache trouble never changes the outcome of a request: an uncacheable
/// response is passed through and a failed invalidation is only logged.
pub async fn response_cache(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.enable_cache {
        return next.run(request).await;
    }

    let method = request.method().clone();
    if method == Method::GET {
        let path = request.uri().path().to_owned();
        match state.policy.cache_rule_for(&path) {
            Some(rule) => serve_cached(&state, rule, request, next).await,
            None => next.run(request).await,
        }
    } else if is_mutation(&method) {
        run_and_invalidate(&state, request, next).await
    } else {
        next.run(request).await
    }
}

fn is_mutation(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

async fn serve_cached(state: &AppState, rule: CacheRule, request: Request, next: Next) -> Response {
    let principal = request
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or_default();

    if rule.scope == CacheScope::PerPrincipal && principal.is_anonymous() {
        debug!(path = %request.uri().path(), "identity-scoped read without a principal, bypassing cache");
        return next.run(request).await;
    }

    let key = cache_key(&principal, request.uri().path(), request.uri().query());
    if let Some(cached) = state.cache.lookup(&key) {
        debug!(key = %key, outcome = "hit", "serving cached response");
        return cached.to_response("HIT");
    }
    debug!(key = %key, outcome = "miss", "cache miss, executing handler");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let upper = response.body().size_hint().upper();
    if !matches!(upper, Some(len) if len <= state.config.max_cached_body_bytes as u64) {
        let err = TollgateError::BodyTooLarge {
            limit: state.config.max_cached_body_bytes,
        };
        warn!(key = %key, error = %err, "response not cached");
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, state.config.max_cached_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            // The handler's body failed mid-stream; nothing was stored.
            warn!(key = %key, error = %err, "upstream response body failed, not cached");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        headers: parts.headers.clone(),
        body: bytes.clone(),
    };
    let ttl = rule.ttl.unwrap_or_else(|| state.cache.config().default_ttl());
    match state.cache.store_with_ttl(key.as_str(), cached, ttl) {
        Ok(()) => debug!(key = %key, ttl_secs = ttl.as_secs(), "caching response"),
        Err(err) => warn!(key = %key, error = %err, "response not cached"),
    }

    parts
        .headers
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

async fn run_and_invalidate(state: &AppState, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let Some(family) = state.policy.family_for(&path).map(str::to_owned) else {
        return next.run(request).await;
    };

    let response = next.run(request).await;
    if response.status().is_success() {
        state.invalidate_family(&path, &family);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use http_body::{Frame, SizeHint};
    use tower::ServiceExt;

    use crate::policy::RoutePolicy;
    use crate::state::ApiConfig;

    /// Advertises a small exact length, then errors on the first poll.
    struct BrokenBody;

    impl HttpBody for BrokenBody {
        type Data = Bytes;
        type Error = io::Error;

        fn poll_frame(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
            Poll::Ready(Some(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "handler body aborted",
            ))))
        }

        fn size_hint(&self) -> SizeHint {
            SizeHint::with_exact(16)
        }
    }

    fn request_with(headers: &[(&str, &str)], peer: Option<[u8; 4]>) -> Request {
        let mut builder = HttpRequest::builder().uri("/api/v1/resources");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        if let Some(ip) = peer {
            builder = builder.extension(ConnectInfo(SocketAddr::from((ip, 5000))));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_client_address_from_connection() {
        let request = request_with(&[("x-real-ip", "203.0.113.1")], Some([10, 0, 0, 7]));
        assert_eq!(client_address(&request, false), "10.0.0.7");
    }

    #[test]
    fn test_client_address_from_trusted_proxy() {
        let request = request_with(&[("x-real-ip", "203.0.113.1")], Some([10, 0, 0, 7]));
        assert_eq!(client_address(&request, true), "203.0.113.1");

        let request = request_with(
            &[("x-forwarded-for", " , 198.51.100.2, 10.0.0.1")],
            Some([10, 0, 0, 7]),
        );
        assert_eq!(client_address(&request, true), "198.51.100.2");
    }

    #[test]
    fn test_client_address_unknown() {
        let request = request_with(&[], None);
        assert_eq!(client_address(&request, true), UNKNOWN_CLIENT);
    }

    #[tokio::test]
    async fn test_broken_upstream_body_is_not_cached() {
        let policy = RoutePolicy::default().cache("/broken", CacheScope::Shared);
        let state = Arc::new(AppState::with_policy(ApiConfig::default(), policy).unwrap());
        let app = protect(
            Router::new().route("/broken", get(|| async { Response::new(Body::new(BrokenBody)) })),
            state.clone(),
        );

        let response = app
            .oneshot(HttpRequest::get("/broken").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(CACHE_STATUS_HEADER).is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
        assert!(state.cache.is_empty());
    }

    #[test]
    fn test_mutation_methods() {
        assert!(is_mutation(&Method::PATCH));
        assert!(!is_mutation(&Method::GET));
        assert!(!is_mutation(&Method::HEAD));
    }
}
