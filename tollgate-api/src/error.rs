//! API error handling.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tollgate_core::error::TollgateError;
use tollgate_core::types::Tier;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
        }
    }

    /// Bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// Not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND")
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, "INTERNAL_ERROR")
    }

    /// Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message, "VALIDATION_ERROR")
    }

    /// Returns the HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<TollgateError> for ApiError {
    fn from(err: TollgateError) -> Self {
        match &err {
            TollgateError::EmptyInvalidationPattern | TollgateError::InvalidTtl => {
                ApiError::validation(err.to_string())
            }
            TollgateError::UnknownTier(_) => ApiError::bad_request(err.to_string()),
            _ => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal("An internal error occurred")
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Rate limit rejection
// ═══════════════════════════════════════════════════════════════════════════

/// 429 response for a request rejected by admission control.
#[derive(Debug, Clone, Copy)]
pub struct RateLimited {
    tier: Tier,
    retry_after: Duration,
}

impl RateLimited {
    /// Creates a rejection for `tier`.
    pub fn new(tier: Tier, retry_after: Duration) -> Self {
        Self { tier, retry_after }
    }

    /// Retry delay in whole seconds, rounded up and never zero.
    pub fn retry_after_secs(&self) -> u64 {
        whole_seconds(self.retry_after).max(1)
    }
}

#[derive(Serialize)]
struct RateLimitedResponse {
    error: RateLimitedBody,
    retry_after_secs: u64,
}

#[derive(Serialize)]
struct RateLimitedBody {
    code: &'static str,
    message: String,
    tier: Tier,
}

impl IntoResponse for RateLimited {
    fn into_response(self) -> Response {
        let secs = self.retry_after_secs();
        let body = RateLimitedResponse {
            error: RateLimitedBody {
                code: "RATE_LIMITED",
                message: format!(
                    "Too many requests for the {} tier, retry in {} seconds",
                    self.tier, secs
                ),
                tier: self.tier,
            },
            retry_after_secs: secs,
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        response
    }
}

/// Rounds a duration up to whole seconds.
pub(crate) fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
